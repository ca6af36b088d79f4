//! Storage, capture runs and reporting for Adlens.
//!
//! The extraction engine lives in `adlens-scanner`; this crate persists what
//! it finds in SQLite and turns the stored ads into reports.

use colored::Colorize;

pub mod capture;
pub mod data;
pub mod report;

pub const BANNER: &str = r#"
             _ _
   __ _  __| | | ___ _ __  ___
  / _` |/ _` | |/ _ \ '_ \/ __|
 | (_| | (_| | |  __/ | | \__ \
  \__,_|\__,_|_|\___|_| |_|___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "why am I seeing this ad?".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
