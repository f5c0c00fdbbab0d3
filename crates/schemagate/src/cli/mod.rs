//! Command-line interface
//!
//! ```text
//! schemagate serve   [--config PATH]   bootstrap, then serve /health
//! schemagate check   [--config PATH]   run the startup sequence once
//! schemagate migrate [--config PATH]   same, with automatic migration forced on
//! schemagate status  [--config PATH]   applied and pending migrations, no DDL
//! ```

pub mod handlers;

use clap::{Arg, Command};

pub fn build_cli() -> Command {
    Command::new("schemagate")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Startup database readiness gate for the CMS")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(config_arg())
        .subcommand(cmd_serve())
        .subcommand(cmd_check())
        .subcommand(cmd_migrate())
        .subcommand(cmd_status())
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_name("PATH")
        .global(true)
        .value_parser(clap::value_parser!(std::path::PathBuf))
        .help("Config file (default: ./schemagate.toml)")
}

fn cmd_serve() -> Command {
    Command::new("serve").about("Run the startup sequence, then serve the health endpoint")
}

fn cmd_check() -> Command {
    Command::new("check")
        .about("Run the startup sequence once and print the health report")
        .after_help("Exits 0 when the database is ready, otherwise with the failure's exit code.")
}

fn cmd_migrate() -> Command {
    Command::new("migrate").about("Apply pending migrations (forces automatic application on)")
}

fn cmd_status() -> Command {
    Command::new("status").about("Show applied and pending migrations without changing the schema")
}
