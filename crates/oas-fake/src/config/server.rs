//! Declarative fake-server definitions.

use super::settings::{Settings, DEFAULT_CASSETTE_PATH};
use crate::callbacks::CallbackRegistry;
use crate::contract::Contract;
use crate::error::FakeError;
use crate::faker::FakerOptions;
use crate::vcr::Mode;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Where a definition gets its contract from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// OpenAPI file (`.json` or YAML)
    File(PathBuf),
    /// Already parsed contract
    Contract(Arc<Contract>),
}

impl SchemaSource {
    pub fn load(&self) -> Result<Arc<Contract>, FakeError> {
        match self {
            SchemaSource::File(path) => Contract::from_file(path).map(Arc::new),
            SchemaSource::Contract(contract) => Ok(contract.clone()),
        }
    }
}

/// A fake server described by a type.
///
/// Every method has a library default; implementors override what they
/// need and register their callbacks explicitly. [`Overrides`] given at
/// resolution time win over the definition.
pub trait FakeServer {
    fn schema(&self) -> Option<SchemaSource> {
        None
    }

    /// `None` defers to the `OAS_FAKE_MODE` environment variable.
    fn mode(&self) -> Option<Mode> {
        None
    }

    fn cassette_path(&self) -> PathBuf {
        PathBuf::from(DEFAULT_CASSETTE_PATH)
    }

    fn validate_requests(&self) -> bool {
        true
    }

    fn validate_responses(&self) -> bool {
        true
    }

    fn faker_options(&self) -> FakerOptions {
        FakerOptions::default()
    }

    fn register_callbacks(&self, _registry: &CallbackRegistry) {}

    /// Resolve the definition into settings and a populated registry.
    fn resolve(&self, overrides: Overrides) -> Result<(Settings, Arc<CallbackRegistry>), FakeError> {
        let schema = overrides.schema.or_else(|| self.schema());
        let contract = schema.map(|s| s.load()).transpose()?;
        let mode = match overrides.mode.or_else(|| self.mode()) {
            Some(mode) => mode,
            None => Mode::from_env()?,
        };

        let settings = Settings {
            contract,
            mode,
            cassette_path: overrides
                .cassette_path
                .unwrap_or_else(|| self.cassette_path()),
            validate_requests: overrides
                .validate_requests
                .unwrap_or_else(|| self.validate_requests()),
            validate_responses: overrides
                .validate_responses
                .unwrap_or_else(|| self.validate_responses()),
            faker: overrides.faker.unwrap_or_else(|| self.faker_options()),
        };

        let registry = Arc::new(CallbackRegistry::new());
        self.register_callbacks(&registry);
        debug!(
            "Resolved fake server: mode {}, {} callbacks",
            settings.mode,
            registry.len()
        );
        Ok((settings, registry))
    }
}

/// Per-instance values that take precedence over a [`FakeServer`]'s own.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub schema: Option<SchemaSource>,
    pub mode: Option<Mode>,
    pub cassette_path: Option<PathBuf>,
    pub validate_requests: Option<bool>,
    pub validate_responses: Option<bool>,
    pub faker: Option<FakerOptions>,
}
