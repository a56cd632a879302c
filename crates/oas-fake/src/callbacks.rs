//! Two-tier registry of user overrides.
//!
//! Callbacks are keyed either by operation identifier or by
//! `METHOD:/path/pattern`. When both could apply, the identifier wins.

use crate::contract::OperationAddress;
use crate::error::FakeError;
use crate::http::{CanonicalRequest, CanonicalResponse};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Override behavior: receives the request and the default response (if any)
/// and returns the response to send.
pub type Callback =
    Arc<dyn Fn(&CanonicalRequest, Option<CanonicalResponse>) -> CanonicalResponse + Send + Sync>;

/// Registry of overrides, shared between setup code and request handlers.
///
/// Both maps are behind a lock so registration while a session is armed is
/// safe; a call already in flight keeps the callback it selected.
#[derive(Default)]
pub struct CallbackRegistry {
    by_operation_id: RwLock<HashMap<String, Callback>>,
    by_path: RwLock<HashMap<String, Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override for an operation identifier. Last write wins.
    pub fn register<F>(&self, operation_id: &str, callback: F)
    where
        F: Fn(&CanonicalRequest, Option<CanonicalResponse>) -> CanonicalResponse
            + Send
            + Sync
            + 'static,
    {
        self.by_operation_id
            .write()
            .insert(operation_id.to_string(), Arc::new(callback));
    }

    /// Register an override for a path pattern and method. Last write wins.
    pub fn register_for_path<F>(&self, path: &str, method: &str, callback: F)
    where
        F: Fn(&CanonicalRequest, Option<CanonicalResponse>) -> CanonicalResponse
            + Send
            + Sync
            + 'static,
    {
        let key = OperationAddress::new(path, method).key();
        self.by_path.write().insert(key, Arc::new(callback));
    }

    /// Whether a path + method override exists for the operation.
    pub fn has(&self, operation: &OperationAddress) -> bool {
        self.by_path.read().contains_key(&operation.key())
    }

    pub fn has_for_operation_id(&self, operation_id: &str) -> bool {
        self.by_operation_id.read().contains_key(operation_id)
    }

    /// Select and apply an override.
    ///
    /// Precedence: identifier callback (when an identifier is given), then
    /// path + method callback, then the default response unchanged. With none
    /// of those available the call fails with `NoOverrideAvailable`.
    pub fn execute(
        &self,
        operation: &OperationAddress,
        request: &CanonicalRequest,
        default_response: Option<CanonicalResponse>,
        operation_id: Option<&str>,
    ) -> Result<CanonicalResponse, FakeError> {
        // Clone the callback out so the lock is not held while user code runs.
        let by_id = operation_id.and_then(|id| self.by_operation_id.read().get(id).cloned());
        if let Some(callback) = by_id {
            debug!(
                "Applying operation-id callback '{}' for {}",
                operation_id.unwrap_or_default(),
                operation
            );
            return Ok(callback(request, default_response));
        }

        let by_path = self.by_path.read().get(&operation.key()).cloned();
        if let Some(callback) = by_path {
            debug!("Applying path callback for {}", operation);
            return Ok(callback(request, default_response));
        }

        default_response.ok_or_else(|| FakeError::NoOverrideAvailable {
            method: operation.method().to_string(),
            path: operation.path().to_string(),
        })
    }

    /// Drop every registered callback.
    pub fn clear(&self) {
        self.by_operation_id.write().clear();
        self.by_path.write().clear();
    }

    pub fn len(&self) -> usize {
        self.by_operation_id.read().len() + self.by_path.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.by_operation_id.read().keys().cloned().collect();
        let mut paths: Vec<String> = self.by_path.read().keys().cloned().collect();
        ids.sort();
        paths.sort();
        f.debug_struct("CallbackRegistry")
            .field("operation_ids", &ids)
            .field("paths", &paths)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pets() -> OperationAddress {
        OperationAddress::new("/pets", "GET")
    }

    fn request() -> CanonicalRequest {
        CanonicalRequest::new("GET", "https://host/pets")
    }

    fn fixed(status: u16) -> impl Fn(&CanonicalRequest, Option<CanonicalResponse>) -> CanonicalResponse
    {
        move |_, _| CanonicalResponse::new(status)
    }

    #[test]
    fn test_operation_id_wins_over_path() {
        let registry = CallbackRegistry::new();
        registry.register_for_path("/pets", "GET", fixed(201));
        registry.register("listPets", fixed(202));

        let resp = registry
            .execute(&pets(), &request(), None, Some("listPets"))
            .unwrap();
        assert_eq!(resp.status, 202);
    }

    #[test]
    fn test_path_used_without_identifier_or_unknown_identifier() {
        let registry = CallbackRegistry::new();
        registry.register_for_path("/pets", "get", fixed(201));
        registry.register("otherOp", fixed(202));

        let resp = registry.execute(&pets(), &request(), None, None).unwrap();
        assert_eq!(resp.status, 201);

        let resp = registry
            .execute(&pets(), &request(), None, Some("listPets"))
            .unwrap();
        assert_eq!(resp.status, 201);
    }

    #[test]
    fn test_default_passes_through_unchanged() {
        let registry = CallbackRegistry::new();
        let default = CanonicalResponse::new(200).with_body("[]");
        let resp = registry
            .execute(&pets(), &request(), Some(default.clone()), Some("listPets"))
            .unwrap();
        assert_eq!(resp, default);
    }

    #[test]
    fn test_no_override_and_no_default_fails() {
        let registry = CallbackRegistry::new();
        let err = registry
            .execute(&pets(), &request(), None, None)
            .unwrap_err();
        match err {
            FakeError::NoOverrideAvailable { method, path } => {
                assert_eq!(method, "GET");
                assert_eq!(path, "/pets");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_callback_receives_default_response() {
        let registry = CallbackRegistry::new();
        registry.register("listPets", |req, default| {
            let mut resp = default.expect("default response");
            resp.headers.insert("X-Seen-Method", req.method.as_str());
            resp
        });
        let resp = registry
            .execute(
                &pets(),
                &request(),
                Some(CanonicalResponse::new(200)),
                Some("listPets"),
            )
            .unwrap();
        assert_eq!(resp.headers.get_line("x-seen-method").as_deref(), Some("GET"));
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = CallbackRegistry::new();
        registry.register("listPets", fixed(201));
        registry.register("listPets", fixed(204));
        let resp = registry
            .execute(&pets(), &request(), None, Some("listPets"))
            .unwrap();
        assert_eq!(resp.status, 204);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_has_lookups_and_clear() {
        let registry = CallbackRegistry::new();
        registry.register_for_path("/pets", "get", fixed(200));
        registry.register("listPets", fixed(200));

        assert!(registry.has(&OperationAddress::new("/pets", "GET")));
        assert!(registry.has(&OperationAddress::new("/pets", "get")));
        assert!(!registry.has(&OperationAddress::new("/pets", "POST")));
        assert!(registry.has_for_operation_id("listPets"));
        assert!(!registry.has_for_operation_id("listpets"));

        registry.clear();
        assert!(registry.is_empty());
        assert!(!registry.has(&pets()));
        assert!(!registry.has_for_operation_id("listPets"));
    }
}
