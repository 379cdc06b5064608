use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenrelay::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging. Logs go to stderr so `generate` output stays clean.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tokenrelay=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            port,
            host,
            stub,
        } => {
            tokenrelay::cli::serve(config, port, host, stub).await?;
        }
        Commands::Generate {
            config,
            prompt,
            stub,
        } => {
            tokenrelay::cli::generate(config, prompt, stub).await?;
        }
        Commands::Pull { config } => {
            tokenrelay::cli::pull(config).await?;
        }
    }

    Ok(())
}
