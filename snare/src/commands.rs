use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/snare/";
pub const DEFAULT_DB_PATH: &str = "~/.config/snare/snare.db";

fn db_arg() -> clap::Arg {
    arg!(--"db" <PATH>)
        .required(false)
        .help("Path to the snare database")
        .default_value(DEFAULT_DB_PATH)
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("snare")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("snare")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the snare database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Directory to store the snare database in")
                        .default_value(DEFAULT_CONFIG_DIR),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite any existing database at the specified location.")
                        .required(false),
                ),
        )
        .subcommand(
            command!("keywords")
                .about("Manage the stored keyword set")
                .subcommand_required(true)
                .subcommand(
                    command!("set")
                        .about("Replace the stored keywords")
                        .arg(
                            arg!(<KEYWORD> ...)
                                .required(true)
                                .help("Keywords to store; comma separated values are split"),
                        )
                        .arg(db_arg()),
                )
                .subcommand(command!("list").about("Show the stored keywords").arg(db_arg()))
                .subcommand(command!("clear").about("Remove all stored keywords").arg(db_arg())),
        )
        .subcommand(
            command!("scan")
                .about(
                    "Scan a page for keywords in its text, attributes, images and form fields. \
                Pages fetched by URL also have their traffic inspected.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("The page to fetch and scan")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("file"),
                )
                .arg(
                    arg!(-F --"file" <PATH>)
                        .required(false)
                        .help("A local HTML file to scan")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-k --"keyword" <KEYWORD>)
                        .required(false)
                        .help("Keyword to look for; repeat or comma separate. Defaults to the stored set")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"tolerant")
                        .required(false)
                        .help("Also accept matches that differ by a single character")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"annotate" <PATH>)
                        .required(false)
                        .help("Write the page with highlighted matches to this file")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-t --"timeout" <SECONDS>)
                        .required(false)
                        .help("HTTP timeout for URL scans")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                )
                .arg(db_arg()),
        )
        .subcommand(
            command!("results")
                .about("Show stored results for an origin, or list stored origins")
                .arg(
                    arg!([ORIGIN])
                        .required(false)
                        .help("Origin or page URL, as shown by `snare results`"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown"])
                        .default_value("text"),
                )
                .arg(db_arg()),
        )
        .subcommand(
            command!("clear")
                .about("Delete stored results for an origin")
                .arg(
                    arg!(<ORIGIN>)
                        .required(true)
                        .help("Origin or page URL whose results should be removed"),
                )
                .arg(db_arg()),
        )
}
