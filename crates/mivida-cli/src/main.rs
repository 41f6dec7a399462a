//! Mivida CLI - Main entry point

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mivida_cli::{run, Cli, CliConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so exported backups can be piped from stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mivida=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::load_or_init(&CliConfig::default_path());

    run(cli, config).await
}
