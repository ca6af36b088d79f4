use adlens_core::capture::{CaptureOptions, execute_capture};
use adlens_core::data::Database;
use adlens_core::report::{ReportFormat, gather_report_data, generate_report, save_report};
use adlens_scanner::disclosure::decode_payload;
use adlens_scanner::sanitize::disclosure_text;
use adlens_scanner::{
    AdRecord, Disclosure, ExtractionTiming, HttpDisclosureFetcher, ScanOutcome, parse_disclosure,
};
use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/adlens/";
pub const DEFAULT_DB_PATH: &str = "~/.config/adlens/adlens.db";
pub const DB_FILE_NAME: &str = "adlens.db";

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

/// Expands a leading `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Reads a whole file, or stdin when no file is given.
pub fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}

/// Pretty JSON for a parsed disclosure, or a notice when nothing matched.
pub fn render_disclosure(disclosure: Option<&Disclosure>) -> Result<String> {
    match disclosure {
        Some(disclosure) => Ok(serde_json::to_string_pretty(disclosure)?),
        None => Ok("No targeting information found".to_string()),
    }
}

/// Runs the grammar over disclosure markup after sanitising it.
pub fn parse_text(text: &str) -> Option<Disclosure> {
    parse_disclosure(&disclosure_text(text.trim()))
}

/// Unwraps a raw disclosure response down to the parsed targeting.
pub fn decode_disclosure(body: &str) -> Result<Option<Disclosure>> {
    let html = decode_payload(body.trim()).context("Failed to decode disclosure payload")?;
    debug!("Decoded disclosure markup: {}", html);
    Ok(parse_text(&html))
}

/// One line per ad for `ads list`.
pub fn format_ad_line(ad: &AdRecord) -> String {
    let advertiser = ad
        .advertiser
        .as_deref()
        .or(ad.title.as_deref())
        .unwrap_or("Unknown advertiser");
    let id = ad
        .id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    let targets = if ad.targets.is_empty() {
        "no targeting".to_string()
    } else {
        ad.targets
            .iter()
            .map(|target| match target.segment {
                Some(ref segment) => format!("{}: {}", target.kind, segment),
                None => target.kind.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{} [{}] {}", advertiser, id, targets)
}

pub fn open_database(path: &str) -> Result<Database> {
    let db_path = expand_path(path);
    if !Database::exists(&db_path) {
        bail!(
            "No database at {}. Run `adlens init` first.",
            db_path.display()
        );
    }
    Database::new(&db_path).with_context(|| format!("Failed to open {}", db_path.display()))
}

fn db_from_args(args: &ArgMatches) -> Result<Database> {
    let path = args
        .get_one::<String>("db")
        .map(String::as_str)
        .unwrap_or(DEFAULT_DB_PATH);
    open_database(path)
}

/// Creates the config directory and a fresh database in it.
pub fn init_database(config_dir: &Path, force: bool) -> Result<PathBuf> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let db_path = config_dir.join(DB_FILE_NAME);
    if force && Database::exists(&db_path) {
        Database::drop(&db_path)
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
    }

    let db = Database::new(&db_path)
        .with_context(|| format!("Failed to create database at {}", db_path.display()))?;
    db.init_start_date()?;
    Ok(db_path)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  ADLENS INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_dir = expand_path(
        args.get_one::<String>("PATH")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_DIR),
    );
    let mut force = args.get_flag("force");
    let db_path = config_dir.join(DB_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!(
            "A database already exists at {}",
            db_path.display().to_string().bright_white()
        );
        println!("{}", "Continuing will delete every stored ad.".yellow());

        let response = print_prompt("Do you want to continue? [y/N]:")?;
        println!();
        if response != "y" && response != "yes" {
            println!("{} Initialization cancelled.", "✗".red().bold());
            return Ok(());
        }
        force = true;
    }

    let db_path = init_database(&config_dir, force)?;
    println!("{} Config directory: {}", "✓".green().bold(), config_dir.display());
    println!("{} Database: {}", "✓".green().bold(), db_path.display());
    Ok(())
}

pub fn handle_parse(args: &ArgMatches) -> Result<()> {
    let text = read_input(args.get_one::<PathBuf>("FILE"))?;
    let disclosure = parse_text(&text);
    println!("{}", render_disclosure(disclosure.as_ref())?);
    Ok(())
}

pub fn handle_decode(args: &ArgMatches) -> Result<()> {
    let body = read_input(args.get_one::<PathBuf>("FILE"))?;
    let disclosure = decode_disclosure(&body)?;
    println!("{}", render_disclosure(disclosure.as_ref())?);
    Ok(())
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> Result<()> {
    let snapshot = args
        .get_one::<PathBuf>("SNAPSHOT")
        .context("A snapshot path is required")?;
    let base = args
        .get_one::<String>("disclosure-base")
        .context("A disclosure base URL is required")?;
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(10);

    let mut db = db_from_args(args)?;
    let fetcher = HttpDisclosureFetcher::with_timeout(base, timeout)?;

    let mut options = CaptureOptions::new(snapshot);
    options.timing = ExtractionTiming {
        timeout: Duration::from_secs(timeout),
        ..ExtractionTiming::default()
    };
    options.show_progress_bars = !quiet;

    let summary = execute_capture(&mut db, options, fetcher)
        .await
        .map_err(anyhow::Error::msg)?;

    match summary.outcome {
        ScanOutcome::Completed(ref report) => {
            let counts = &report.counts;
            println!(
                "{} {} new ads from {} candidates ({} visible)",
                "✓".green().bold(),
                report.ads.len(),
                counts.all_posts,
                counts.visible
            );
            if counts.timeouts + counts.missing_toggles + counts.missing_ids > 0 {
                println!(
                    "{} {} timed out, {} without a menu, {} without an id",
                    "⚠".yellow(),
                    counts.timeouts,
                    counts.missing_toggles,
                    counts.missing_ids
                );
            }
            for ad in &report.ads {
                println!("  {} {}", "•".cyan(), format_ad_line(ad));
            }
        }
        ScanOutcome::Disabled => {
            println!(
                "{} Monitoring is disabled. Run `adlens monitor enable` to collect ads.",
                "⚠".yellow().bold()
            );
        }
        ScanOutcome::InFlight => {
            println!("{} A scan was already running", "⚠".yellow().bold());
        }
    }
    Ok(())
}

pub fn handle_ads_list(args: &ArgMatches) -> Result<()> {
    let db = db_from_args(args)?;
    let ads = db.get_ads()?;
    if ads.is_empty() {
        println!("No ads stored yet.");
        return Ok(());
    }
    for ad in &ads {
        println!("{} {}", "•".cyan(), format_ad_line(ad));
    }
    println!("\n{} ads", ads.len());
    Ok(())
}

pub fn handle_ads_clear(args: &ArgMatches) -> Result<()> {
    let db = db_from_args(args)?;
    let removed = db.clear_ads()?;
    println!("{} Removed {} ads", "✓".green().bold(), removed);
    Ok(())
}

pub fn handle_targets_list(args: &ArgMatches) -> Result<()> {
    let db = db_from_args(args)?;
    let counts = db.get_target_counts_by_kind()?;
    if counts.is_empty() {
        println!("No targeting attributes stored yet.");
        return Ok(());
    }
    for (kind, count) in counts {
        println!("  {:>5}  {}", count, kind.bright_white());
    }
    Ok(())
}

pub fn handle_targets_clear(args: &ArgMatches) -> Result<()> {
    let db = db_from_args(args)?;
    let removed = db.clear_targets()?;
    println!("{} Removed {} targeting attributes", "✓".green().bold(), removed);
    Ok(())
}

pub fn handle_monitor_set(args: &ArgMatches, enabled: bool) -> Result<()> {
    let db = db_from_args(args)?;
    db.set_monitor_enabled(enabled)?;
    if enabled {
        println!("{} Monitoring enabled", "✓".green().bold());
    } else {
        println!("{} Monitoring disabled", "✓".green().bold());
    }
    Ok(())
}

pub fn handle_monitor_status(args: &ArgMatches) -> Result<()> {
    let db = db_from_args(args)?;
    if db.monitor_enabled()? {
        println!("Monitoring is {}", "on".green().bold());
    } else {
        println!("Monitoring is {}", "off".red().bold());
    }
    Ok(())
}

pub fn handle_report(args: &ArgMatches) -> Result<()> {
    let db = db_from_args(args)?;
    let format_name = args
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let Some(format) = ReportFormat::from_str(format_name) else {
        bail!("Unknown report format: {}", format_name);
    };

    let data = gather_report_data(&db)?;
    let content = generate_report(&data, format)?;

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            save_report(&content, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Report saved to {}", "✓".green().bold(), path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
