use std::{ffi::OsString, io::IsTerminal};

use clap::{ArgGroup, Parser};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use miette::{IntoDiagnostic, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
#[command(group(ArgGroup::new("mode").required(true).args(["extract", "create"])))]
struct Cli {
    /// Extract an FL4 archive into a directory
    #[arg(short, long)]
    extract: bool,

    /// Create an FL4 archive from a directory
    #[arg(short, long)]
    create: bool,

    #[command(flatten)]
    args: commands::CommonArgs,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

/// Accept the single dash spellings `-in`, `-out` and `-cp`.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some("-in") => "--in".into(),
            Some("-out") => "--out".into(),
            Some("-cp") => "--cp".into(),
            _ => arg,
        })
        .collect()
}

fn level_filter(verbosity: &Verbosity<InfoLevel>) -> LevelFilter {
    match verbosity.log_level_filter() {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

fn main() -> Result<()> {
    better_panic::install();

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .without_time()
                .compact(),
        )
        .with(
            EnvFilter::builder()
                .with_default_directive(level_filter(&cli.verbose).into())
                .from_env_lossy(),
        )
        .try_init()
        .into_diagnostic()?;

    if cli.extract {
        cli.args.extract()
    } else {
        cli.args.create()
    }
}
