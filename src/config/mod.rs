//! Configuration loading and management

mod engine;
mod lifecycle;
mod selector;

pub use engine::EngineSettings;
pub use lifecycle::LifecycleSettings;
pub use selector::SelectorSettings;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::EngineKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Engine backend settings, keyed by engine kind. Engines without a
    /// section here are simply not registered.
    #[serde(default)]
    pub engines: HashMap<EngineKind, EngineSettings>,

    /// Declared-type routing table and fallback policy
    #[serde(default)]
    pub selector: SelectorSettings,

    /// Polling interval and timeout budget
    #[serde(default)]
    pub lifecycle: LifecycleSettings,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a directory.
    /// Looks for: .malsieve/config.toml (preferred) or malsieve.toml
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let preferred = dir.join(".malsieve/config.toml");
        if preferred.exists() {
            return Self::from_file(&preferred);
        }

        let flat = dir.join("malsieve.toml");
        if flat.exists() {
            return Self::from_file(&flat);
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// API tokens can come from the environment instead of the config file
    /// (MALSIEVE_SANDBOX_TOKEN, MALSIEVE_STATIC_SCAN_TOKEN,
    /// MALSIEVE_REPUTATION_TOKEN), so credentials never have to live on disk.
    fn apply_env_overrides(&mut self) {
        for kind in EngineKind::ALL {
            let var = format!(
                "MALSIEVE_{}_TOKEN",
                kind.as_str().replace('-', "_").to_ascii_uppercase()
            );
            if let Ok(token) = std::env::var(&var) {
                if let Some(settings) = self.engines.get_mut(&kind) {
                    settings.api_token = Some(token);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let toml = r#"
            [engines.sandbox]
            base_url = "https://cape.example"
            api_token = "secret"
            machine = "win10"

            [engines.reputation]
            base_url = "https://rep.example"
            max_upload_bytes = 33554432

            [selector]
            fallback = "unsupported"

            [selector.extensions]
            exe = ["sandbox", "reputation"]
            apk = ["static-scan"]

            [lifecycle]
            poll_interval_ms = 15000
            timeout_secs = 900
        "#;

        let config: Config = toml::from_str(toml).expect("config should parse");

        let sandbox = &config.engines[&EngineKind::Sandbox];
        assert_eq!(sandbox.base_url, "https://cape.example");
        assert_eq!(sandbox.api_token.as_deref(), Some("secret"));
        assert_eq!(sandbox.machine.as_deref(), Some("win10"));

        let reputation = &config.engines[&EngineKind::Reputation];
        assert_eq!(reputation.max_upload_bytes, Some(32 * 1024 * 1024));

        assert_eq!(config.lifecycle.poll_interval_ms, 15000);
        assert_eq!(config.lifecycle.timeout_secs, 900);
        assert_eq!(config.selector.extensions["exe"].len(), 2);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert!(config.engines.is_empty());
        assert_eq!(config.lifecycle.poll_interval_ms, 10_000);
        assert_eq!(config.lifecycle.timeout_secs, 600);
    }
}
