use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hoard",
    about = "Hoard: a content-addressed file store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Store a local file and print its hash
    Upload(UploadArgs),
    /// Copy a stored file out of the store
    Download(DownloadArgs),
    /// Remove a stored file
    Remove(RemoveArgs),
    /// Print the content hash of a file without storing it
    Hash(HashArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<String>,
    #[arg(long)]
    pub root: Option<PathBuf>,
}

#[derive(Args)]
pub struct UploadArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct DownloadArgs {
    pub hash: String,
    /// Output path; defaults to the stored file name in the current directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct RemoveArgs {
    pub hash: String,
}

#[derive(Args)]
pub struct HashArgs {
    pub path: PathBuf,
}
