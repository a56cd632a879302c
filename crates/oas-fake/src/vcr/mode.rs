//! Session mode definitions.

use crate::error::FakeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Environment variable selecting the default mode.
pub const MODE_ENV_VAR: &str = "OAS_FAKE_MODE";

/// What an armed session does with intercepted calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Real calls go out; every exchange is appended to the cassette
    Record,
    /// Every call is answered from the contract, never from the network
    #[default]
    Replay,
    /// Real calls go out unmodified
    Passthrough,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Record => "record",
            Mode::Replay => "replay",
            Mode::Passthrough => "passthrough",
        }
    }

    /// Mode from [`MODE_ENV_VAR`]; unset or empty means `Replay`.
    pub fn from_env() -> Result<Self, FakeError> {
        Self::from_env_value(std::env::var(MODE_ENV_VAR).ok().as_deref())
    }

    pub fn from_env_value(value: Option<&str>) -> Result<Self, FakeError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Mode::Replay),
            Some(raw) => raw.parse(),
        }
    }
}

impl FromStr for Mode {
    type Err = FakeError;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "record" => Ok(Mode::Record),
            "replay" => Ok(Mode::Replay),
            "passthrough" => Ok(Mode::Passthrough),
            _ => Err(FakeError::InvalidModeString(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
