//! Thin pax-alike front end over `archive-core`/`archive-filters`/`archive-formats`:
//! list or extract an archive's entries, or create one from files on disk.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "archive-cli",
    about = "Read and write streaming archives (tar, cpio, zip, ar, ...)",
    version
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List or extract entries from an archive
    Read(commands::read::ReadArgs),

    /// Create an archive from files on disk
    Write(commands::write::WriteArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Read(args) => commands::read::run(&args),
        Commands::Write(args) => commands::write::run(&args),
    };

    if let Err(e) = result {
        eprintln!("archive-cli: {e}");
        std::process::exit(1);
    }
}
