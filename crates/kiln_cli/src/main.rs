//! The `kiln` command-line front end.
//!
//! Provides `kiln build` for one-shot builds, `kiln watch` for rebuilding
//! when sources change, and `kiln clean` for cache maintenance.

#![warn(missing_docs)]

mod build;
mod clean;
mod pipeline;
mod watch;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Kiln, an incremental builder for declarative query definitions.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln query artifact builder")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a `kiln.toml` file or the directory holding it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build artifacts for one or every schema configuration.
    Build(BuildArgs),
    /// Build, then rebuild whenever a source file changes.
    Watch(WatchArgs),
    /// Remove unreferenced cache blobs.
    Clean(CleanArgs),
}

/// Arguments for the `kiln build` subcommand.
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Schema configuration to build. Builds every configuration if omitted.
    #[arg(short, long)]
    pub schema: Option<String>,

    /// Report element failures as warnings instead of failing the build.
    #[arg(long)]
    pub partial: bool,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Directory receiving one `<schema>.json` artifact per configuration.
    #[arg(short, long, default_value = ".kiln-out")]
    pub out: String,
}

/// Arguments for the `kiln watch` subcommand.
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Schema configuration to watch. Watches every configuration if omitted.
    #[arg(short, long)]
    pub schema: Option<String>,

    /// Report element failures as warnings instead of failing the build.
    #[arg(long)]
    pub partial: bool,

    /// Directory receiving one `<schema>.json` artifact per configuration.
    #[arg(short, long, default_value = ".kiln-out")]
    pub out: String,

    /// Quiet period in milliseconds that ends a burst of file events.
    #[arg(long, default_value_t = 100)]
    pub debounce_ms: u64,
}

/// Arguments for the `kiln clean` subcommand.
#[derive(Parser, Debug)]
pub struct CleanArgs {
    /// Delete the whole cache directory instead of collecting garbage.
    #[arg(long)]
    pub all: bool,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// One JSON object per diagnostic.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to log at debug level.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to the configuration.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var_os("NO_COLOR").is_none() && std::env::var_os("TERM").is_some(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    pipeline::init_logging(&global);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::Watch(ref args) => watch::run(args, &global),
        Command::Clean(ref args) => clean::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
