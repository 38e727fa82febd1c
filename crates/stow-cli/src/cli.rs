use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stow",
    about = "Stow — content-addressed, versioned object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Store root directory (overrides the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Store a file (or stdin) under a virtual path
    Put(PutArgs),
    /// Write the latest version of a virtual path to a file (or stdout)
    Get(GetArgs),
    /// Show the version history of a virtual path
    Meta(MetaArgs),
    /// Check whether a blob with the given SHA-512 digest is stored
    Exists(ExistsArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Largest accepted upload in bytes
    #[arg(long)]
    pub max_upload_size: Option<u64>,
}

#[derive(Args)]
pub struct PutArgs {
    pub path: String,
    /// Input file; stdin when omitted
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct GetArgs {
    pub path: String,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct MetaArgs {
    pub path: String,
}

#[derive(Args)]
pub struct ExistsArgs {
    pub digest: String,
}
