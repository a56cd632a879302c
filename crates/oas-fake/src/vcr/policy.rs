//! Mode to intercept policy.

use super::mode::Mode;
use serde::{Deserialize, Serialize};

/// Declarative instruction for an interceptor: what to do with each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptPolicy {
    /// Answer every call through the hook, whatever its target
    pub always_intercept: bool,
    /// Let real calls out and record each exchange
    pub record_real: bool,
}

impl InterceptPolicy {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Record => Self {
                always_intercept: false,
                record_real: true,
            },
            Mode::Replay => Self {
                always_intercept: true,
                record_real: false,
            },
            Mode::Passthrough => Self::default(),
        }
    }

    /// Cassette used by sessions in this mode.
    pub fn cassette_name(mode: Mode) -> &'static str {
        match mode {
            Mode::Record => "recording",
            Mode::Replay | Mode::Passthrough => "fake",
        }
    }
}
