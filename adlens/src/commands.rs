use crate::CLAP_STYLING;
use adlens::handlers::{DEFAULT_CONFIG_DIR, DEFAULT_DB_PATH};
use adlens_scanner::disclosure::DEFAULT_BASE_URL;
use clap::{arg, command};

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Location of the adlens database")
        .default_value(DEFAULT_DB_PATH)
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("adlens")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("adlens")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Increase log verbosity (-v info, -vv debug, -vvv trace)")
                .required(false)
                .action(clap::ArgAction::Count),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the adlens database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the adlens database in")
                        .default_value(DEFAULT_CONFIG_DIR),
                )
                .arg(
                    arg!(-f - -"force")
                        .help("Overwrites any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("parse")
                .about("Runs the targeting grammar over disclosure text")
                .arg(
                    arg!([FILE])
                        .required(false)
                        .help("File holding the disclosure text (default: stdin)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("decode")
                .about("Decodes a raw disclosure response, sanitises it and parses it")
                .arg(
                    arg!([FILE])
                        .required(false)
                        .help("File holding the raw response body (default: stdin)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(
            command!("scan")
                .about("Runs one capture pass over a saved page snapshot and stores the ads found")
                .arg(
                    arg!(<SNAPSHOT>)
                        .required(true)
                        .help("Saved page markup to scan")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(db_arg())
                .arg(
                    arg!(--"disclosure-base" <URL>)
                        .required(false)
                        .help("Base URL that disclosure requests are resolved against")
                        .default_value(DEFAULT_BASE_URL),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-candidate extraction and request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
        .subcommand(
            command!("ads")
                .about("Inspect or clear stored ads")
                .subcommand_required(true)
                .subcommand(command!("list").about("List stored ads").arg(db_arg()))
                .subcommand(command!("clear").about("Delete all stored ads").arg(db_arg())),
        )
        .subcommand(
            command!("targets")
                .about("Inspect or clear stored targeting attributes")
                .subcommand_required(true)
                .subcommand(
                    command!("list")
                        .about("List targeting attributes by kind")
                        .arg(db_arg()),
                )
                .subcommand(
                    command!("clear")
                        .about("Delete all stored targeting attributes")
                        .arg(db_arg()),
                ),
        )
        .subcommand(
            command!("monitor")
                .about("Turn ad collection on or off")
                .subcommand_required(true)
                .subcommand(command!("enable").about("Resume collecting ads").arg(db_arg()))
                .subcommand(command!("disable").about("Stop collecting ads").arg(db_arg()))
                .subcommand(
                    command!("status")
                        .about("Show whether collection is on")
                        .arg(db_arg()),
                ),
        )
        .subcommand(
            command!("report")
                .about("Summarise stored ads and the reasons they were shown")
                .arg(db_arg())
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, csv, markdown")
                        .value_parser(["text", "json", "csv", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        )
}
