mod commands;

use crate::commands::{
    handle_import, handle_runs, handle_transform, ImportArgs, RunsArgs, TransformArgs,
};

use clap::{Parser, Subcommand};
use common::error::WharfError;
use std::path::PathBuf;
use time::macros::format_description;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "wharf")]
pub struct Cli {
    #[arg(
        long = "config-path",
        short = 'c',
        help = "path to config file",
        global = true
    )]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Import a CSV feed into its staging table
    Import(ImportArgs),
    /// Recompute a curated table from its SQL recipe
    Transform(TransformArgs),
    /// List recorded runs, most recent first
    Runs(RunsArgs),
}

fn run_cmd(func: Result<(), WharfError>) {
    if let Err(e) = func {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:2]");

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_timer(fmt::time::LocalTime::new(time_format))
                .with_target(false)
                .with_level(true)
                .with_thread_names(false)
                .with_line_number(false)
                .with_file(false)
                .with_span_events(fmt::format::FmtSpan::NONE)
                .compact(),
        )
        .with(filter)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Cmd::Import(args) => run_cmd(handle_import(&args, cli.config_path.clone())),
        Cmd::Transform(args) => run_cmd(handle_transform(&args, cli.config_path.clone())),
        Cmd::Runs(args) => run_cmd(handle_runs(&args, cli.config_path.clone())),
    }
}
