use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fsstore")]
#[command(about = "Filesystem event store CLI", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $FSSTORE_CONFIG or config/fsstore.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store root directory, overriding the configuration
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store if needed and print its identity
    Init,
    /// Print identity, head and tail as JSON
    Info,
    /// Append one event and print its position
    Append(AppendArgs),
    /// Print the event at a position
    Get(GetArgs),
    /// Drop old events
    Trim(TrimArgs),
    /// Print events, optionally following new ones
    Stream(StreamArgs),
    /// Reclaim leftovers of crashed writers now
    Scavenge,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct AppendArgs {
    /// Event payload; read from stdin when omitted
    pub payload: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    pub position: u64,
}

#[derive(clap::Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).multiple(true).args(["trim_id", "size"])))]
pub struct TrimArgs {
    /// Drop events up to and including this position
    #[arg(long)]
    pub trim_id: Option<u64>,

    /// Keep only the newest SIZE events
    #[arg(long)]
    pub size: Option<u64>,
}

#[derive(clap::Args, Debug)]
pub struct StreamArgs {
    /// Event id after which to resume ("0" replays everything retained)
    #[arg(long)]
    pub resume_after: Option<String>,

    /// Add ids to JSON events (useful for resuming after a disconnect)
    #[arg(long)]
    pub ids: bool,

    /// Keep running and print new events as they are appended
    #[arg(long)]
    pub follow: bool,
}
