//! Resolved session settings.

use crate::contract::Contract;
use crate::error::FakeError;
use crate::faker::FakerOptions;
use crate::vcr::Mode;
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_CASSETTE_PATH: &str = "./cassettes";

/// The single immutable configuration value a session runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bound contract; a session cannot start without one
    pub contract: Option<Arc<Contract>>,
    pub mode: Mode,
    pub cassette_path: PathBuf,
    pub validate_requests: bool,
    pub validate_responses: bool,
    pub faker: FakerOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            contract: None,
            mode: Mode::default(),
            cassette_path: PathBuf::from(DEFAULT_CASSETTE_PATH),
            validate_requests: true,
            validate_responses: true,
            faker: FakerOptions::default(),
        }
    }
}

impl Settings {
    /// Library defaults with the mode taken from the environment.
    pub fn from_env() -> Result<Self, FakeError> {
        Ok(Self {
            mode: Mode::from_env()?,
            ..Self::default()
        })
    }

    pub fn with_contract(mut self, contract: Arc<Contract>) -> Self {
        self.contract = Some(contract);
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cassette_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cassette_path = path.into();
        self
    }

    pub fn with_request_validation(mut self, enabled: bool) -> Self {
        self.validate_requests = enabled;
        self
    }

    pub fn with_response_validation(mut self, enabled: bool) -> Self {
        self.validate_responses = enabled;
        self
    }

    pub fn with_faker(mut self, options: FakerOptions) -> Self {
        self.faker = options;
        self
    }

    /// The contract, or `SchemaNotBound`.
    pub fn require_contract(&self) -> Result<&Arc<Contract>, FakeError> {
        self.contract.as_ref().ok_or(FakeError::SchemaNotBound)
    }
}
