use std::path::Path;

use anyhow::{Context, bail};
use secrecy::ExposeSecret;

use crate::{Config, ProviderConfig};

pub(crate) fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content =
        std::fs::read_to_string(path).with_context(|| format!("read config file {}", path.display()))?;

    let config: Config =
        serde_yaml::from_str(&content).with_context(|| format!("parse config file {}", path.display()))?;

    config.validate()?;

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    if config.server.port == 0 {
        bail!("server.port must be a valid TCP port");
    }

    validate_provider("openai", &config.providers.openai)?;
    validate_provider("claude", &config.providers.claude)?;

    if let Some(nvidia) = &config.providers.nvidia {
        validate_provider("nvidia", nvidia)?;
    }

    Ok(())
}

fn validate_provider(name: &str, provider: &ProviderConfig) -> anyhow::Result<()> {
    if provider.api_key.expose_secret().trim().is_empty() {
        bail!("provider {name}: api_key must be provided");
    }

    if provider.base_url.trim().is_empty() {
        bail!("provider {name}: base_url must be provided");
    }

    if provider.models.is_empty() {
        bail!("provider {name}: at least one model must be configured");
    }

    for model in &provider.models {
        if model.id.trim().is_empty() {
            bail!("provider {name}: model id must not be empty");
        }
    }

    for header in provider.headers.keys() {
        if !is_canonical_header_name(header) {
            bail!("provider {name}: header {header:?} is not a valid canonical HTTP header");
        }
    }

    for (alias, target) in &provider.aliases {
        if alias.trim().is_empty() {
            bail!("provider {name}: alias name must not be empty");
        }

        if target.trim().is_empty() {
            bail!("provider {name}: alias {alias:?} target must not be empty");
        }
    }

    Ok(())
}

fn is_canonical_header_name(header: &str) -> bool {
    !header.is_empty() && header.chars().all(|c| c == '-' || c.is_ascii_alphabetic())
}
