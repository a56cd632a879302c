//! OpenAPI-driven fake responses for outgoing HTTP calls.
//!
//! An application under test makes HTTP calls as usual; while a session is
//! armed those calls are intercepted and answered from the bound contract:
//!
//! - `contract` - Parsed OpenAPI document and path-pattern matching
//! - `http` - Protocol-neutral request/response representations
//! - `resolver` - Maps concrete requests to contract operation identifiers
//! - `callbacks` - User overrides keyed by operation id or method + path
//! - `faker` - Schema-conformant response body generation
//! - `validation` - Request/response conformance checks
//! - `handler` - The intercept-and-respond pipeline
//! - `vcr` - Modes, interception layers, cassettes and the session lifecycle
//! - `config` - Config file and resolved session settings
//! - `global` - Process-wide default session

pub mod callbacks;
pub mod config;
pub mod contract;
pub mod error;
pub mod faker;
pub mod global;
pub mod handler;
pub mod http;
pub mod resolver;
pub mod validation;
pub mod vcr;

pub use callbacks::{Callback, CallbackRegistry};
pub use config::{Config, FakeServer, Settings};
pub use contract::{Contract, Operation, OperationAddress};
pub use error::{FakeError, Mismatch, MismatchKind};
pub use faker::{FakeResponseGenerator, FakerOptions};
pub use handler::RequestHandler;
pub use http::{CanonicalRequest, CanonicalResponse, Headers};
pub use resolver::OperationResolver;
pub use validation::{RequestValidator, ResponseValidator};
pub use vcr::{
    HttpInterceptor, InterceptPolicy, Interceptor, LocalInterceptor, Mode, ModeManager,
};
