//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ServerConfig};

/// docbridge authorization server
#[derive(Parser, Debug)]
#[command(
    name = "docbridge",
    version,
    about = "Embedded OAuth 2.0 authorization server for the docbridge API"
)]
pub struct Cli {
    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(long, short = 'c', env = "DOCBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind, overriding the file
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on, overriding the file
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Log level filter, overriding the file
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Load the configuration and apply command-line overrides
    ///
    /// # Errors
    ///
    /// Propagates [`ServerConfig::load`] errors.
    pub fn load_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut ServerConfig) {
        if let Some(bind) = &self.bind {
            config.bind_address.clone_from(bind);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
    }
}
