use adlens::handlers;
use adlens_core::print_banner;
use colored::Colorize;
use commands::command_argument_builder;
use tracing::Level;

mod commands;

fn init_tracing(quiet: bool, verbosity: u8) {
    let level = match (quiet, verbosity) {
        (true, _) => Level::ERROR,
        (false, 0) => Level::WARN,
        (false, 1) => Level::INFO,
        (false, 2) => Level::DEBUG,
        (false, _) => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(quiet, chosen_command.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        None => return,
        Some(("init", primary_command)) => handlers::handle_init(primary_command),
        Some(("parse", primary_command)) => handlers::handle_parse(primary_command),
        Some(("decode", primary_command)) => handlers::handle_decode(primary_command),
        Some(("scan", primary_command)) => handlers::handle_scan(primary_command, quiet).await,
        Some(("ads", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handlers::handle_ads_list(secondary_command),
            Some(("clear", secondary_command)) => handlers::handle_ads_clear(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("targets", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handlers::handle_targets_list(secondary_command),
            Some(("clear", secondary_command)) => handlers::handle_targets_clear(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("monitor", primary_command)) => match primary_command.subcommand() {
            Some(("enable", secondary_command)) => {
                handlers::handle_monitor_set(secondary_command, true)
            }
            Some(("disable", secondary_command)) => {
                handlers::handle_monitor_set(secondary_command, false)
            }
            Some(("status", secondary_command)) => handlers::handle_monitor_status(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("report", primary_command)) => handlers::handle_report(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
