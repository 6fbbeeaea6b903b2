use clap::ArgMatches;
use colored::Colorize;
use commands::command_argument_builder;
use snare::handlers;
use snare_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    tracing_subscriber::fmt()
        .with_max_level(if quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dispatch(&chosen_command).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn dispatch(matches: &ArgMatches) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("init", primary_command)) => handlers::handle_init(primary_command),
        Some(("keywords", primary_command)) => match primary_command.subcommand() {
            Some(("set", secondary_command)) => handlers::handle_keywords_set(secondary_command),
            Some(("list", secondary_command)) => handlers::handle_keywords_list(secondary_command),
            Some(("clear", secondary_command)) => {
                handlers::handle_keywords_clear(secondary_command)
            }
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("scan", primary_command)) => handlers::handle_scan(primary_command).await,
        Some(("results", primary_command)) => handlers::handle_results(primary_command),
        Some(("clear", primary_command)) => handlers::handle_clear(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
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
