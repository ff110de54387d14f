//! Gateway configuration structures to map the modelgate YAML configuration.

#![deny(missing_docs)]

mod loader;
mod provider;
mod server;

use std::path::Path;

use serde::Deserialize;

pub use provider::{ApiStyle, ModelConfig, ProviderConfig, ProvidersConfig};
pub use server::ServerConfig;

/// Main configuration structure for the modelgate application.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP server configuration settings.
    pub server: ServerConfig,
    /// Upstream provider configuration settings.
    pub providers: ProvidersConfig,
}

impl Config {
    /// Load configuration from a YAML file path and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
        loader::load(path)
    }

    /// Validates the listener port and every configured provider.
    pub fn validate(&self) -> anyhow::Result<()> {
        loader::validate(self)
    }
}
