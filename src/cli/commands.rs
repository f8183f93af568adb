use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stagewatch", version, about = "Live status view for multi-stage agent pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Follow a status snapshot file written by a running pipeline
    Watch(WatchArgs),
    /// Run a simulated pipeline with the live status view
    Demo(DemoArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
    /// Show version and build information
    Version,
}

/// Display flags shared by the commands that draw the status view.
#[derive(Args, Clone, Default)]
pub struct DisplayArgs {
    /// Refresh interval in milliseconds
    #[arg(long)]
    pub refresh: Option<u64>,

    /// Use plain ASCII glyphs
    #[arg(long)]
    pub ascii: bool,
}

#[derive(Args, Clone)]
pub struct WatchArgs {
    /// Snapshot file to read (defaults to snapshot.path from the config)
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Draw a single frame and exit
    #[arg(long)]
    pub once: bool,

    /// Append frames instead of redrawing the screen
    #[arg(long)]
    pub no_clear: bool,

    #[command(flatten)]
    pub display: DisplayArgs,
}

#[derive(Args, Clone)]
pub struct DemoArgs {
    /// Request text shown in the header
    #[arg(short, long, default_value = "Convert authentication system to async with comprehensive tests")]
    pub request: String,

    /// YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Mirror snapshots to this JSON file (overrides snapshot.path)
    #[arg(short, long)]
    pub mirror: Option<PathBuf>,

    /// Simulated work per agent in milliseconds
    #[arg(long, default_value_t = 800)]
    pub step_ms: u64,

    /// Make this agent fail, sending the run through its optional stages.
    /// Must belong to a mandatory stage
    #[arg(long)]
    pub fail_agent: Option<String>,

    #[command(flatten)]
    pub display: DisplayArgs,
}

#[derive(Args, Clone)]
pub struct ValidateArgs {
    /// Path to YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,
}
