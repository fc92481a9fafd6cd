use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "trellis",
    about = "Trellis: content-addressed object graph store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decompose a JSON document and store its nodes
    Push(PushArgs),
    /// Stream a node and its closure
    Fetch(FetchArgs),
    /// Print a single stored node
    Show(ShowArgs),
    /// Report which ids are stored
    Has(HasArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

/// Where the store lives and which graph to address.
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    #[arg(long, default_value = ".trellis")]
    pub store: PathBuf,
    #[arg(short, long, default_value = "default")]
    pub graph: String,
}

#[derive(Args)]
pub struct PushArgs {
    pub file: PathBuf,
    #[command(flatten)]
    pub target: StoreArgs,
    /// Default chunk size for `@()` fields
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

#[derive(Args)]
pub struct FetchArgs {
    pub id: String,
    #[command(flatten)]
    pub target: StoreArgs,
    /// Only descendants at most this many detachments deep
    #[arg(long)]
    pub depth: Option<u32>,
    /// One `id<TAB>body` line per node instead of a JSON array
    #[arg(long)]
    pub lines: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    pub id: String,
    #[command(flatten)]
    pub target: StoreArgs,
}

#[derive(Args)]
pub struct HasArgs {
    #[arg(required = true)]
    pub ids: Vec<String>,
    #[command(flatten)]
    pub target: StoreArgs,
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML server configuration
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<String>,
    /// Journal file, overriding the configuration
    #[arg(long)]
    pub store: Option<PathBuf>,
}
