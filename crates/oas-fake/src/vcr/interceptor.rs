//! The interception seam and its in-process implementation.

use super::cassette::{Cassette, Episode};
use super::policy::InterceptPolicy;
use crate::error::FakeError;
use crate::http::{CanonicalRequest, CanonicalResponse};
use bytes::Bytes;
use hyper::{Request, Response};
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Interceptor is already armed")]
    AlreadyArmed,

    #[error("Interceptor is not armed")]
    NotArmed,

    /// The policy lets this call through; the caller uses its real transport.
    #[error("Request was not intercepted")]
    NotIntercepted,

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cassette {}: {source}", .path.display())]
    Cassette {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cassette {} is not valid: {source}", .path.display())]
    CassetteFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Forwarding to {target} failed: {reason}")]
    Forward { target: String, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

/// Answers intercepted calls. Implemented by the request handler.
pub trait InterceptHook: Send + Sync {
    fn on_request(&self, request: &Request<Bytes>) -> Result<Response<Bytes>, FakeError>;
}

/// Everything an interceptor needs to arm.
#[derive(Clone)]
pub struct InterceptSetup {
    pub cassette_path: PathBuf,
    pub cassette_name: String,
    pub policy: InterceptPolicy,
    pub hook: Option<Arc<dyn InterceptHook>>,
}

impl fmt::Debug for InterceptSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptSetup")
            .field("cassette_path", &self.cassette_path)
            .field("cassette_name", &self.cassette_name)
            .field("policy", &self.policy)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// An HTTP interception layer that can be armed and disarmed.
///
/// Arming twice without a disarm in between is an error; the session
/// object makes its own start/stop idempotent.
pub trait Interceptor: Send + Sync {
    fn arm(&self, setup: InterceptSetup) -> Result<(), InterceptError>;
    fn disarm(&self) -> Result<(), InterceptError>;
    fn is_armed(&self) -> bool;
}

struct Armed {
    policy: InterceptPolicy,
    hook: Option<Arc<dyn InterceptHook>>,
    cassette: Arc<Cassette>,
}

/// In-process interceptor for code that owns its HTTP transport.
///
/// Calls are handed to [`dispatch`](Self::dispatch). With a replaying policy
/// the hook answers synchronously; otherwise `NotIntercepted` tells the
/// caller to make the real call, and [`record`](Self::record) captures the
/// exchange when the policy records.
#[derive(Default)]
pub struct LocalInterceptor {
    armed: RwLock<Option<Armed>>,
    arm_count: AtomicUsize,
}

impl LocalInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self, request: &Request<Bytes>) -> Result<Response<Bytes>, FakeError> {
        let (policy, hook) = {
            let guard = self.armed.read();
            let armed = guard.as_ref().ok_or(InterceptError::NotArmed)?;
            (armed.policy, armed.hook.clone())
        };

        if !policy.always_intercept {
            debug!("Letting {} {} through", request.method(), request.uri());
            return Err(InterceptError::NotIntercepted.into());
        }
        match hook {
            Some(hook) => hook.on_request(request),
            None => {
                warn!("Intercepting policy armed without a hook");
                Err(InterceptError::NotIntercepted.into())
            }
        }
    }

    /// Capture a real exchange the caller made after `NotIntercepted`.
    /// Returns whether it was recorded.
    pub fn record(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
    ) -> Result<bool, InterceptError> {
        let guard = self.armed.read();
        let armed = guard.as_ref().ok_or(InterceptError::NotArmed)?;
        if !armed.policy.record_real {
            return Ok(false);
        }
        armed.cassette.record(Episode::new(
            &CanonicalRequest::from_wire(request),
            &CanonicalResponse::from_wire(response),
            None,
        ));
        Ok(true)
    }

    /// How many times this interceptor has been armed.
    pub fn arm_count(&self) -> usize {
        self.arm_count.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> Option<InterceptPolicy> {
        self.armed.read().as_ref().map(|a| a.policy)
    }

    /// Episodes recorded in the current cassette.
    pub fn episodes(&self) -> Vec<Episode> {
        self.armed
            .read()
            .as_ref()
            .map(|a| a.cassette.episodes())
            .unwrap_or_default()
    }
}

impl Interceptor for LocalInterceptor {
    fn arm(&self, setup: InterceptSetup) -> Result<(), InterceptError> {
        let mut guard = self.armed.write();
        if guard.is_some() {
            return Err(InterceptError::AlreadyArmed);
        }
        let cassette = Arc::new(Cassette::new(&setup.cassette_path, &setup.cassette_name));
        if setup.policy.record_real {
            cassette.load()?;
        }
        info!(
            "Local interceptor armed (cassette {:?}, policy {:?})",
            cassette.path(),
            setup.policy
        );
        *guard = Some(Armed {
            policy: setup.policy,
            hook: setup.hook,
            cassette,
        });
        self.arm_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// A failed cassette write leaves the interceptor armed with its
    /// episodes, so the next disarm retries the write.
    fn disarm(&self) -> Result<(), InterceptError> {
        let mut guard = self.armed.write();
        let armed = guard.as_ref().ok_or(InterceptError::NotArmed)?;
        if armed.policy.record_real {
            armed.cassette.save()?;
        }
        *guard = None;
        info!("Local interceptor disarmed");
        Ok(())
    }

    fn is_armed(&self) -> bool {
        self.armed.read().is_some()
    }
}

impl fmt::Debug for LocalInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalInterceptor")
            .field("armed", &self.is_armed())
            .field("arm_count", &self.arm_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcr::Mode;
    use tempfile::TempDir;

    struct Teapot;

    impl InterceptHook for Teapot {
        fn on_request(&self, _: &Request<Bytes>) -> Result<Response<Bytes>, FakeError> {
            Ok(Response::builder().status(418).body(Bytes::new()).unwrap())
        }
    }

    fn setup(dir: &TempDir, mode: Mode) -> InterceptSetup {
        InterceptSetup {
            cassette_path: dir.path().to_path_buf(),
            cassette_name: InterceptPolicy::cassette_name(mode).to_string(),
            policy: InterceptPolicy::for_mode(mode),
            hook: Some(Arc::new(Teapot)),
        }
    }

    fn get() -> Request<Bytes> {
        Request::builder().uri("https://api.example.com/pets").body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_dispatch_requires_arming() {
        let interceptor = LocalInterceptor::new();
        let err = interceptor.dispatch(&get()).unwrap_err();
        assert!(matches!(err, FakeError::Intercept(InterceptError::NotArmed)));
    }

    #[test]
    fn test_replay_runs_hook() {
        let dir = TempDir::new().unwrap();
        let interceptor = LocalInterceptor::new();
        interceptor.arm(setup(&dir, Mode::Replay)).unwrap();
        assert_eq!(interceptor.dispatch(&get()).unwrap().status(), 418);
        interceptor.disarm().unwrap();
        assert!(!interceptor.is_armed());
    }

    #[test]
    fn test_passthrough_is_not_intercepted() {
        let dir = TempDir::new().unwrap();
        let interceptor = LocalInterceptor::new();
        interceptor.arm(setup(&dir, Mode::Passthrough)).unwrap();
        let err = interceptor.dispatch(&get()).unwrap_err();
        assert!(matches!(err, FakeError::Intercept(InterceptError::NotIntercepted)));
        let resp = Response::builder().status(200).body(Bytes::new()).unwrap();
        assert!(!interceptor.record(&get(), &resp).unwrap());
    }

    #[test]
    fn test_record_writes_cassette_on_disarm() {
        let dir = TempDir::new().unwrap();
        let interceptor = LocalInterceptor::new();
        interceptor.arm(setup(&dir, Mode::Record)).unwrap();
        let resp = Response::builder().status(201).body(Bytes::from_static(b"{}")).unwrap();
        assert!(interceptor.record(&get(), &resp).unwrap());
        assert_eq!(interceptor.episodes().len(), 1);
        interceptor.disarm().unwrap();
        assert!(dir.path().join("recording.json").exists());

        // Re-arming appends to what is on disk
        interceptor.arm(setup(&dir, Mode::Record)).unwrap();
        assert_eq!(interceptor.episodes().len(), 1);
        interceptor.disarm().unwrap();
        assert_eq!(interceptor.arm_count(), 2);
    }

    #[test]
    fn test_failed_cassette_write_keeps_episodes() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("cassettes");
        std::fs::write(&blocker, "not a directory").unwrap();

        let interceptor = LocalInterceptor::new();
        let mut record = setup(&dir, Mode::Record);
        record.cassette_path = blocker.clone();
        interceptor.arm(record).unwrap();
        let resp = Response::builder().status(200).body(Bytes::new()).unwrap();
        interceptor.record(&get(), &resp).unwrap();

        assert!(matches!(
            interceptor.disarm(),
            Err(InterceptError::Cassette { .. })
        ));
        assert!(interceptor.is_armed());
        assert_eq!(interceptor.episodes().len(), 1);

        std::fs::remove_file(&blocker).unwrap();
        interceptor.disarm().unwrap();
        assert!(!interceptor.is_armed());
        assert!(blocker.join("recording.json").exists());
    }

    #[test]
    fn test_double_arm_and_disarm_are_errors() {
        let dir = TempDir::new().unwrap();
        let interceptor = LocalInterceptor::new();
        interceptor.arm(setup(&dir, Mode::Replay)).unwrap();
        assert!(matches!(
            interceptor.arm(setup(&dir, Mode::Replay)),
            Err(InterceptError::AlreadyArmed)
        ));
        interceptor.disarm().unwrap();
        assert!(matches!(interceptor.disarm(), Err(InterceptError::NotArmed)));
    }
}
