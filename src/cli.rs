use clap::{Parser, Subcommand};
use mediafetch::config::NodeRole;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediafetch")]
#[command(about = "Media download workers and their dispatch master", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cluster worker: secret-gated /execute plus heartbeats to the master
    Worker(NodeArgs),
    /// Single node with open access and the legacy /video and /audio routes
    Standalone(NodeArgs),
    /// Worker registry and download proxy
    Master(NodeArgs),
}

impl Commands {
    pub fn into_parts(self) -> (NodeRole, NodeArgs) {
        match self {
            Commands::Worker(args) => (NodeRole::ClusterWorker, args),
            Commands::Standalone(args) => (NodeRole::Standalone, args),
            Commands::Master(args) => (NodeRole::Master, args),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct NodeArgs {
    /// Path to the TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Port to listen on, overrides configuration and PORT
    #[arg(long)]
    pub port: Option<u16>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}
