//! Configuration for oas-fake.
//!
//! # Module Structure
//!
//! - `settings` - The immutable value a session runs with
//! - `server` - Declarative [`FakeServer`] definitions and override precedence
//!
//! [`Config`] is the YAML file format read by the binary; it resolves into
//! [`Settings`] once, at startup.

mod server;
mod settings;

pub use server::{FakeServer, Overrides, SchemaSource};
pub use settings::{Settings, DEFAULT_CASSETTE_PATH};

use crate::contract::Contract;
use crate::faker::FakerOptions;
use crate::vcr::Mode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// OpenAPI contract file, relative to the config file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<PathBuf>,

    /// record, replay or passthrough; unset defers to `OAS_FAKE_MODE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default = "default_cassette_path")]
    pub cassette_path: PathBuf,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub faker: FakerOptions,

    #[serde(default)]
    pub listen: ListenConfig,

    /// Real target for origin-form requests, e.g. `https://api.example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,

    /// Directory of the file this config was read from
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            contract: None,
            mode: None,
            cassette_path: default_cassette_path(),
            validation: ValidationConfig::default(),
            faker: FakerOptions::default(),
            listen: ListenConfig::default(),
            upstream: None,
            base_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub requests: bool,
    #[serde(default = "default_true")]
    pub responses: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            requests: true,
            responses: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 picks an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_cassette_path() -> PathBuf {
    PathBuf::from(DEFAULT_CASSETTE_PATH)
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8089
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(mode) = &self.mode {
            mode.parse::<Mode>()?;
        }

        if let (Some(min), Some(max)) = (self.faker.min_items, self.faker.max_items) {
            if min > max {
                anyhow::bail!("faker.minItems ({min}) must not exceed faker.maxItems ({max})");
            }
        }

        if let Some(upstream) = &self.upstream {
            if !upstream.starts_with("http://") && !upstream.starts_with("https://") {
                anyhow::bail!(
                    "Unsupported upstream '{}'. Expected an http:// or https:// URL",
                    upstream
                );
            }
        }

        if self.listen.host.trim().is_empty() {
            anyhow::bail!("listen.host must not be empty");
        }
        Ok(())
    }

    /// Contract path resolved against the config file's directory.
    pub fn contract_path(&self) -> Option<PathBuf> {
        let contract = self.contract.as_ref()?;
        Some(match &self.base_dir {
            Some(base) if contract.is_relative() => base.join(contract),
            _ => contract.clone(),
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        format!("{}:{}", self.listen.host, self.listen.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.listen.host, self.listen.port))
    }

    /// Resolve into session settings, loading the contract.
    pub fn to_settings(&self) -> Result<Settings, anyhow::Error> {
        let mode = match &self.mode {
            Some(mode) => mode.parse()?,
            None => Mode::from_env()?,
        };
        let contract = match self.contract_path() {
            Some(path) => Some(Arc::new(Contract::from_file(&path)?)),
            None => None,
        };

        Ok(Settings {
            contract,
            mode,
            cassette_path: self.cassette_path.clone(),
            validate_requests: self.validation.requests,
            validate_responses: self.validation.responses,
            faker: self.faker.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("{}").unwrap();
        assert!(config.contract.is_none());
        assert_eq!(config.cassette_path, PathBuf::from("./cassettes"));
        assert!(config.validation.requests && config.validation.responses);
        assert_eq!(config.listen_addr().unwrap(), "127.0.0.1:8089".parse().unwrap());
    }

    #[test]
    fn test_camel_case_keys() {
        let yaml = r#"
mode: " Record "
cassettePath: /tmp/tapes
validation:
  responses: false
faker:
  alwaysFakeOptionals: true
  minItems: 2
  maxItems: 2
listen:
  port: 0
upstream: https://api.example.com
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert!(config.validation.requests);
        assert!(!config.validation.responses);
        assert!(config.faker.always_fake_optionals);
        assert_eq!(config.listen.port, 0);

        let settings = config.to_settings().unwrap();
        assert_eq!(settings.mode, Mode::Record);
        assert_eq!(settings.cassette_path, PathBuf::from("/tmp/tapes"));
        assert!(!settings.validate_responses);
    }

    #[test]
    fn test_validation_errors() {
        assert!(Config::from_yaml_str("mode: bogus").is_err());
        assert!(Config::from_yaml_str("faker: {minItems: 5, maxItems: 1}").is_err());
        assert!(Config::from_yaml_str("upstream: ftp://x").is_err());
    }

    #[test]
    fn test_contract_relative_to_config_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("api.yaml"),
            "openapi: 3.0.0\npaths:\n  /pets:\n    get:\n      responses:\n        '200': {description: ok}\n",
        )
        .unwrap();
        let config_path = dir.path().join("oas-fake.yaml");
        std::fs::write(&config_path, "contract: api.yaml\nmode: replay\n").unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.contract_path(), Some(dir.path().join("api.yaml")));
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.contract.unwrap().operations().len(), 1);
    }
}
