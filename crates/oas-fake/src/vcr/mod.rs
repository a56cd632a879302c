//! Modes, interception layers, cassettes and the session lifecycle.
//!
//! # Module Structure
//!
//! - `mode` - Record / replay / passthrough and environment resolution
//! - `policy` - Pure mapping of a mode to what an interceptor does
//! - `interceptor` - The [`Interceptor`] seam and [`LocalInterceptor`]
//! - `cassette` - Persisted recordings of real exchanges
//! - `server` - [`HttpInterceptor`], a hyper listener used as proxy or base URL
//! - `client` / `forwarding` - Reaching real targets
//! - `manager` - [`ModeManager`], the explicit session object

mod cassette;
mod client;
mod forwarding;
mod interceptor;
mod manager;
mod mode;
mod policy;
mod server;

pub use cassette::{Cassette, Episode, RecordedRequest, RecordedResponse};
pub use interceptor::{InterceptError, InterceptHook, InterceptSetup, Interceptor, LocalInterceptor};
pub use manager::ModeManager;
pub use mode::{Mode, MODE_ENV_VAR};
pub use policy::InterceptPolicy;
pub use server::{HttpInterceptor, ERROR_HEADER};
