//! Process-wide default session.
//!
//! A thin veneer over one [`ModeManager<LocalInterceptor>`] for code that
//! does not want to carry a session around. Everything here forwards to
//! [`session()`].

use crate::config::Settings;
use crate::error::FakeError;
use crate::http::{CanonicalRequest, CanonicalResponse};
use crate::vcr::{LocalInterceptor, ModeManager};
use bytes::Bytes;
use hyper::{Request, Response};
use once_cell::sync::Lazy;

static SESSION: Lazy<ModeManager<LocalInterceptor>> =
    Lazy::new(|| ModeManager::new(LocalInterceptor::new(), Settings::default()));

pub fn session() -> &'static ModeManager<LocalInterceptor> {
    &SESSION
}

/// Replace the default session's settings (applied at the next start).
pub fn configure(settings: Settings) {
    SESSION.reconfigure(settings);
}

pub fn register_callback<F>(operation_id: &str, callback: F)
where
    F: Fn(&CanonicalRequest, Option<CanonicalResponse>) -> CanonicalResponse + Send + Sync + 'static,
{
    SESSION.registry().register(operation_id, callback);
}

pub fn register_callback_for_path<F>(path: &str, method: &str, callback: F)
where
    F: Fn(&CanonicalRequest, Option<CanonicalResponse>) -> CanonicalResponse + Send + Sync + 'static,
{
    SESSION.registry().register_for_path(path, method, callback);
}

pub fn start() -> Result<(), FakeError> {
    SESSION.start()
}

pub fn stop() -> Result<(), FakeError> {
    SESSION.stop()
}

pub fn is_running() -> bool {
    SESSION.is_running()
}

/// Send a call through the default session's interceptor.
pub fn dispatch(request: &Request<Bytes>) -> Result<Response<Bytes>, FakeError> {
    SESSION.interceptor().dispatch(request)
}

/// Stop, drop every callback and restore default settings.
pub fn reset() -> Result<(), FakeError> {
    SESSION.stop()?;
    SESSION.registry().clear();
    SESSION.reconfigure(Settings::default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Contract;
    use serial_test::serial;
    use std::sync::Arc;

    const CONTRACT: &str = r#"
openapi: 3.0.0
paths:
  /status:
    get:
      operationId: getStatus
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema: {type: object, required: [up], properties: {up: {type: boolean}}}
"#;

    #[test]
    #[serial]
    fn test_default_session_lifecycle() {
        reset().unwrap();
        assert!(matches!(start(), Err(FakeError::SchemaNotBound)));

        configure(Settings::default().with_contract(Arc::new(Contract::from_yaml_str(CONTRACT).unwrap())));
        register_callback("getStatus", |_, _| {
            CanonicalResponse::json(200, &serde_json::json!({"up": true}))
        });
        start().unwrap();
        assert!(is_running());

        let request = Request::builder()
            .uri("http://svc/status")
            .body(Bytes::new())
            .unwrap();
        let response = dispatch(&request).unwrap();
        assert_eq!(response.body().as_ref(), br#"{"up":true}"#);

        reset().unwrap();
        assert!(!is_running());
        assert!(session().registry().is_empty());
        assert!(session().settings().contract.is_none());
    }
}
