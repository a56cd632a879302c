//! Session lifecycle: `Idle` -> `Armed` -> `Idle`.

use super::interceptor::{InterceptHook, InterceptSetup, Interceptor};
use super::mode::Mode;
use super::policy::InterceptPolicy;
use crate::callbacks::CallbackRegistry;
use crate::config::Settings;
use crate::error::FakeError;
use crate::handler::RequestHandler;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

struct Session {
    settings: Arc<Settings>,
    running: bool,
    /// Created on first use, dropped on stop
    handler: Option<Arc<RequestHandler>>,
}

/// Explicit session object governing one interceptor.
///
/// Start and stop are serialized by an internal lock and are idempotent.
/// Settings changed with [`reconfigure`](Self::reconfigure) apply from the
/// next start.
pub struct ModeManager<I: Interceptor> {
    interceptor: Arc<I>,
    registry: Arc<CallbackRegistry>,
    session: Mutex<Session>,
}

impl<I: Interceptor> ModeManager<I> {
    pub fn new(interceptor: I, settings: Settings) -> Self {
        Self::with_registry(interceptor, settings, Arc::new(CallbackRegistry::new()))
    }

    pub fn with_registry(interceptor: I, settings: Settings, registry: Arc<CallbackRegistry>) -> Self {
        Self {
            interceptor: Arc::new(interceptor),
            registry,
            session: Mutex::new(Session {
                settings: Arc::new(settings),
                running: false,
                handler: None,
            }),
        }
    }

    /// Arm the interceptor for the configured mode. A no-op when running.
    pub fn start(&self) -> Result<(), FakeError> {
        let mut session = self.session.lock();
        if session.running {
            debug!("Session already running");
            return Ok(());
        }

        let handler = Self::handler_for(&mut session, &self.registry)?;
        let mode = session.settings.mode;
        let hook: Arc<dyn InterceptHook> = handler;
        let setup = InterceptSetup {
            cassette_path: session.settings.cassette_path.clone(),
            cassette_name: InterceptPolicy::cassette_name(mode).to_string(),
            policy: InterceptPolicy::for_mode(mode),
            hook: Some(hook),
        };
        self.interceptor.arm(setup)?;
        session.running = true;
        info!("Session started in {} mode", mode);
        Ok(())
    }

    /// Disarm and drop the cached handler. A no-op when idle.
    ///
    /// When disarming fails the session stays running, so a later stop can
    /// retry it.
    pub fn stop(&self) -> Result<(), FakeError> {
        let mut session = self.session.lock();
        if !session.running {
            debug!("Session not running");
            return Ok(());
        }
        self.interceptor.disarm()?;
        session.running = false;
        session.handler = None;
        info!("Session stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().running
    }

    /// The pipeline for the current settings, created on first use.
    pub fn request_handler(&self) -> Result<Arc<RequestHandler>, FakeError> {
        let mut session = self.session.lock();
        Self::handler_for(&mut session, &self.registry)
    }

    fn handler_for(
        session: &mut Session,
        registry: &Arc<CallbackRegistry>,
    ) -> Result<Arc<RequestHandler>, FakeError> {
        if let Some(handler) = &session.handler {
            return Ok(Arc::clone(handler));
        }
        let handler = Arc::new(RequestHandler::new(&session.settings, Arc::clone(registry))?);
        session.handler = Some(Arc::clone(&handler));
        Ok(handler)
    }

    /// Replace the settings. A running session keeps its current handler
    /// until it is stopped.
    pub fn reconfigure(&self, settings: Settings) {
        let mut session = self.session.lock();
        session.settings = Arc::new(settings);
        if !session.running {
            session.handler = None;
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.session.lock().settings)
    }

    pub fn mode(&self) -> Mode {
        self.session.lock().settings.mode
    }

    pub fn registry(&self) -> &Arc<CallbackRegistry> {
        &self.registry
    }

    pub fn interceptor(&self) -> &I {
        &self.interceptor
    }
}

impl<I: Interceptor> Drop for ModeManager<I> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop session on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Contract;
    use crate::vcr::LocalInterceptor;
    use bytes::Bytes;
    use hyper::Request;
    use tempfile::TempDir;

    const CONTRACT: &str = r#"
openapi: 3.0.0
paths:
  /pets:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema: {type: array, items: {type: integer}}
"#;

    fn settings(dir: &TempDir, mode: Mode) -> Settings {
        Settings::default()
            .with_contract(Arc::new(Contract::from_yaml_str(CONTRACT).unwrap()))
            .with_mode(mode)
            .with_cassette_path(dir.path())
    }

    fn get() -> Request<Bytes> {
        Request::builder().uri("https://host/pets").body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_start_twice_arms_once() {
        let dir = TempDir::new().unwrap();
        let manager = ModeManager::new(LocalInterceptor::new(), settings(&dir, Mode::Replay));
        manager.start().unwrap();
        manager.start().unwrap();
        assert!(manager.is_running());
        assert_eq!(manager.interceptor().arm_count(), 1);

        let resp = manager.interceptor().dispatch(&get()).unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let dir = TempDir::new().unwrap();
        let manager = ModeManager::new(LocalInterceptor::new(), settings(&dir, Mode::Replay));
        manager.stop().unwrap();
        assert!(!manager.is_running());
        manager.start().unwrap();
        manager.stop().unwrap();
        manager.stop().unwrap();
        assert!(!manager.interceptor().is_armed());
    }

    #[test]
    fn test_start_without_contract() {
        let manager = ModeManager::new(LocalInterceptor::new(), Settings::default());
        assert!(matches!(manager.start(), Err(FakeError::SchemaNotBound)));
        assert!(!manager.is_running());
        assert!(!manager.interceptor().is_armed());
    }

    #[test]
    fn test_handler_is_cached_until_stop() {
        let dir = TempDir::new().unwrap();
        let manager = ModeManager::new(LocalInterceptor::new(), settings(&dir, Mode::Replay));
        manager.start().unwrap();
        let first = manager.request_handler().unwrap();
        assert!(Arc::ptr_eq(&first, &manager.request_handler().unwrap()));

        // Takes effect only after a stop/start cycle
        manager.reconfigure(settings(&dir, Mode::Replay).with_response_validation(false));
        assert!(manager.request_handler().unwrap().validates_responses());
        manager.stop().unwrap();
        manager.start().unwrap();
        assert!(!manager.request_handler().unwrap().validates_responses());
    }

    #[test]
    fn test_failed_stop_stays_running_and_can_retry() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("cassettes");
        std::fs::write(&blocker, "not a directory").unwrap();
        let manager = ModeManager::new(
            LocalInterceptor::new(),
            settings(&dir, Mode::Record).with_cassette_path(&blocker),
        );
        manager.start().unwrap();
        let resp = hyper::Response::new(Bytes::from_static(b"[1]"));
        assert!(manager.interceptor().record(&get(), &resp).unwrap());

        assert!(matches!(manager.stop(), Err(FakeError::Intercept(_))));
        assert!(manager.is_running());
        assert_eq!(manager.interceptor().episodes().len(), 1);

        std::fs::remove_file(&blocker).unwrap();
        manager.stop().unwrap();
        assert!(!manager.is_running());
        assert!(blocker.join("recording.json").exists());
    }

    #[test]
    fn test_passthrough_does_not_intercept() {
        let dir = TempDir::new().unwrap();
        let manager = ModeManager::new(LocalInterceptor::new(), settings(&dir, Mode::Passthrough));
        manager.start().unwrap();
        assert!(manager.interceptor().dispatch(&get()).is_err());
        assert_eq!(manager.mode(), Mode::Passthrough);
    }
}
