//! CLI commands

mod generate;
mod pull;
mod serve;

pub use generate::generate;
pub use pull::pull;
pub use serve::serve;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{Backend, RelayConfig};

/// Tokenrelay - streaming task server for LLM code generation
#[derive(Parser)]
#[command(name = "tokenrelay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the task server
    Serve {
        /// Configuration file (YAML or JSON)
        #[arg(long, short, env = "TOKENRELAY_CONFIG")]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Serve the stub generator instead of loading a model
        #[arg(long)]
        stub: bool,
    },

    /// Generate once and print tokens to stdout as they arrive
    Generate {
        /// Configuration file (YAML or JSON)
        #[arg(long, short, env = "TOKENRELAY_CONFIG")]
        config: Option<PathBuf>,

        /// Task description, rendered through the prompt template
        #[arg(long, short)]
        prompt: String,

        /// Use the stub generator instead of loading a model
        #[arg(long)]
        stub: bool,
    },

    /// Download the configured model files into the cache
    Pull {
        /// Configuration file (YAML or JSON)
        #[arg(long, short, env = "TOKENRELAY_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Load the config and apply the `--stub` switch
fn load_config(path: Option<&Path>, stub: bool) -> Result<RelayConfig> {
    let mut config = RelayConfig::load(path)?;
    if stub {
        config.model.backend = Backend::Stub;
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["tokenrelay", "serve", "--port", "8080", "--stub"]).unwrap();
        match cli.command {
            Commands::Serve {
                port, host, stub, ..
            } => {
                assert_eq!(port, Some(8080));
                assert_eq!(host, None);
                assert!(stub);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_generate_requires_prompt() {
        assert!(Cli::try_parse_from(["tokenrelay", "generate"]).is_err());
    }

    #[test]
    fn test_stub_switch_overrides_backend() {
        let config = load_config(None, true).unwrap();
        assert_eq!(config.model.backend, Backend::Stub);
    }
}
