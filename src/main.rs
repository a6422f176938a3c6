mod cli;
mod server;

use clap::Parser;
use cli::Cli;
use mediafetch::config::Config;
use mediafetch::observability::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let (role, args) = cli.command.into_parts();

    let mut config = Config::load(args.config, role)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_tracing(&config.telemetry.log_filter);
    tracing::info!(mode = %role, version = env!("CARGO_PKG_VERSION"), "Starting mediafetch");

    server::run(config, role).await
}
