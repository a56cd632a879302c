//! The intercept-and-respond pipeline.
//!
//! One call flows through: canonical conversion, request validation (which
//! yields the operation), default fake response, operation-id resolution,
//! callback override, response validation, wire conversion. Nothing is kept
//! between calls, so a handler can serve concurrent calls.

use crate::callbacks::CallbackRegistry;
use crate::config::Settings;
use crate::contract::{Contract, OperationAddress};
use crate::error::FakeError;
use crate::faker::FakeResponseGenerator;
use crate::http::{CanonicalRequest, CanonicalResponse};
use crate::resolver::OperationResolver;
use crate::validation::{RequestValidator, ResponseValidator};
use crate::vcr::InterceptHook;
use bytes::Bytes;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::debug;

pub struct RequestHandler {
    registry: Arc<CallbackRegistry>,
    resolver: OperationResolver,
    generator: FakeResponseGenerator,
    request_validator: RequestValidator,
    response_validator: ResponseValidator,
    validate_requests: bool,
    validate_responses: bool,
}

impl RequestHandler {
    /// Build a handler for the session settings.
    ///
    /// Fails with `SchemaNotBound` when no contract is configured.
    pub fn new(settings: &Settings, registry: Arc<CallbackRegistry>) -> Result<Self, FakeError> {
        let contract = settings.contract.clone().ok_or(FakeError::SchemaNotBound)?;
        let generator = FakeResponseGenerator::new(contract.clone(), settings.faker.clone());
        Ok(Self::from_parts(contract, registry, generator, settings))
    }

    /// Handler with a custom response generator.
    pub fn with_generator(
        settings: &Settings,
        registry: Arc<CallbackRegistry>,
        generator: FakeResponseGenerator,
    ) -> Result<Self, FakeError> {
        let contract = settings.contract.clone().ok_or(FakeError::SchemaNotBound)?;
        Ok(Self::from_parts(contract, registry, generator, settings))
    }

    fn from_parts(
        contract: Arc<Contract>,
        registry: Arc<CallbackRegistry>,
        generator: FakeResponseGenerator,
        settings: &Settings,
    ) -> Self {
        Self {
            registry,
            resolver: OperationResolver::new(contract.clone()),
            generator,
            request_validator: RequestValidator::new(contract.clone()),
            response_validator: ResponseValidator::new(contract),
            validate_requests: settings.validate_requests,
            validate_responses: settings.validate_responses,
        }
    }

    /// Answer an intercepted wire request.
    pub fn handle(&self, request: &Request<Bytes>) -> Result<Response<Bytes>, FakeError> {
        let canonical = CanonicalRequest::from_wire(request);
        let response = self.handle_canonical(&canonical)?;
        Ok(response.to_wire())
    }

    pub fn handle_canonical(
        &self,
        request: &CanonicalRequest,
    ) -> Result<CanonicalResponse, FakeError> {
        debug!("Intercepted {} {}", request.method, request.url);

        let operation = self.resolve_operation(request)?;

        let default_response = match &operation {
            Some(address) => Some(self.generator.generate(address)?),
            None => None,
        };

        let operation_id = self.resolver.operation_id(request.path(), &request.method);
        // Unknown operations can still be answered by a callback registered
        // for the literal path.
        let address = operation
            .clone()
            .unwrap_or_else(|| OperationAddress::new(request.path(), &request.method));
        let response = self.registry.execute(
            &address,
            request,
            default_response,
            operation_id.as_deref(),
        )?;

        match &operation {
            Some(address) if self.validate_responses => {
                self.response_validator.validate(address, &response)?;
            }
            None if self.validate_responses => {
                debug!(
                    "Skipping response validation for unknown operation {}",
                    address
                );
            }
            _ => {}
        }

        debug!(
            "Answering {} {} with {}",
            request.method, request.url, response.status
        );
        Ok(response)
    }

    /// With request validation on, a non-conforming request fails the call.
    /// With it off, only the operation lookup is made and an unknown path
    /// yields `None`.
    fn resolve_operation(
        &self,
        request: &CanonicalRequest,
    ) -> Result<Option<OperationAddress>, FakeError> {
        if self.validate_requests {
            return self.request_validator.validate(request).map(Some);
        }
        match self.request_validator.locate(request) {
            Ok(op) => Ok(Some(op.address.clone())),
            Err(mismatch) => {
                debug!("Request validation disabled, ignoring: {}", mismatch);
                Ok(None)
            }
        }
    }

    /// Validate a request without generating anything. A no-op when request
    /// validation is disabled.
    pub fn validate_request(&self, request: &Request<Bytes>) -> Result<(), FakeError> {
        if !self.validate_requests {
            return Ok(());
        }
        self.request_validator
            .validate(&CanonicalRequest::from_wire(request))
            .map(|_| ())
    }

    /// Validate a real response against the operation its request addresses.
    /// A no-op when response validation is disabled.
    pub fn validate_response(
        &self,
        request: &Request<Bytes>,
        response: &Response<Bytes>,
    ) -> Result<(), FakeError> {
        if !self.validate_responses {
            return Ok(());
        }
        let canonical = CanonicalRequest::from_wire(request);
        let address = if self.validate_requests {
            self.request_validator.validate(&canonical)?
        } else {
            self.request_validator
                .locate(&canonical)
                .map(|op| op.address.clone())
                .map_err(|mismatch| FakeError::RequestValidationFailed {
                    request: Box::new(canonical.clone()),
                    mismatch,
                })?
        };
        self.response_validator
            .validate(&address, &CanonicalResponse::from_wire(response))
    }

    pub fn validates_requests(&self) -> bool {
        self.validate_requests
    }

    pub fn validates_responses(&self) -> bool {
        self.validate_responses
    }
}

impl InterceptHook for RequestHandler {
    fn on_request(&self, request: &Request<Bytes>) -> Result<Response<Bytes>, FakeError> {
        self.handle(request)
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("validate_requests", &self.validate_requests)
            .field("validate_responses", &self.validate_responses)
            .field("callbacks", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTRACT: &str = r#"
openapi: 3.0.0
info: {title: pets, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema:
                type: array
                items:
                  type: object
                  required: [id, name]
                  properties:
                    id: {type: integer}
                    name: {type: string}
  /health:
    get:
      responses:
        '200': {description: ok}
"#;

    fn settings() -> Settings {
        Settings::default().with_contract(Arc::new(Contract::from_yaml_str(CONTRACT).unwrap()))
    }

    fn get(url: &str) -> Request<Bytes> {
        Request::builder().uri(url).body(Bytes::new()).unwrap()
    }

    #[test]
    fn test_default_response_from_schema() {
        let handler = RequestHandler::new(&settings(), Arc::new(CallbackRegistry::new())).unwrap();
        let resp = handler.handle(&get("https://host/pets")).unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "application/json");
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        for pet in body.as_array().unwrap() {
            assert!(pet.get("id").is_some());
            assert!(pet.get("name").is_some());
        }
    }

    #[test]
    fn test_default_body_with_exclusive_number_bounds_validates() {
        let contract = Contract::from_yaml_str(
            r#"
paths:
  /price:
    get:
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema: {type: number, minimum: 0, exclusiveMinimum: true, maximum: 0.004}
"#,
        )
        .unwrap();
        let settings = Settings::default().with_contract(Arc::new(contract));
        let handler = RequestHandler::new(&settings, Arc::new(CallbackRegistry::new())).unwrap();
        for _ in 0..50 {
            let resp = handler
                .handle_canonical(&CanonicalRequest::new("GET", "https://host/price"))
                .unwrap();
            let price = resp.body_json().unwrap().as_f64().unwrap();
            assert!(price > 0.0);
        }
    }

    #[test]
    fn test_operation_id_callback_wins_over_path_callback() {
        let registry = Arc::new(CallbackRegistry::new());
        registry.register_for_path("/pets", "get", |_, _| {
            CanonicalResponse::json(200, &json!([{"id": 1, "name": "path"}]))
        });
        registry.register("listPets", |_, _| {
            CanonicalResponse::json(200, &json!([{"id": 2, "name": "id"}]))
        });
        let handler = RequestHandler::new(&settings(), registry).unwrap();
        let resp = handler
            .handle_canonical(&CanonicalRequest::new("GET", "https://host/pets"))
            .unwrap();
        assert_eq!(resp.body_json().unwrap(), json!([{"id": 2, "name": "id"}]));
    }

    #[test]
    fn test_callback_sees_default_response() {
        let registry = Arc::new(CallbackRegistry::new());
        registry.register_for_path("/pets", "GET", |_, default| {
            let default = default.expect("default response");
            assert!(default.body_json().unwrap().is_array());
            default.with_header("X-Seen", "yes")
        });
        let handler = RequestHandler::new(&settings(), registry).unwrap();
        let resp = handler
            .handle_canonical(&CanonicalRequest::new("GET", "https://host/pets"))
            .unwrap();
        assert_eq!(resp.headers.get_line("x-seen").as_deref(), Some("yes"));
    }

    #[test]
    fn test_non_conforming_override_is_rejected() {
        let registry = Arc::new(CallbackRegistry::new());
        registry.register("listPets", |_, _| CanonicalResponse::json(200, &json!({"not": "a list"})));
        let handler = RequestHandler::new(&settings(), registry.clone()).unwrap();
        let err = handler
            .handle_canonical(&CanonicalRequest::new("GET", "https://host/pets"))
            .unwrap_err();
        assert!(matches!(err, FakeError::ResponseValidationFailed { .. }));

        let lenient = RequestHandler::new(&settings().with_response_validation(false), registry).unwrap();
        assert!(lenient
            .handle_canonical(&CanonicalRequest::new("GET", "https://host/pets"))
            .is_ok());
    }

    #[test]
    fn test_unknown_path() {
        let registry = Arc::new(CallbackRegistry::new());
        let handler = RequestHandler::new(&settings(), registry.clone()).unwrap();
        let req = CanonicalRequest::new("GET", "https://host/pets-not-in-contract");
        assert!(matches!(
            handler.handle_canonical(&req),
            Err(FakeError::RequestValidationFailed { .. })
        ));

        let lenient = RequestHandler::new(&settings().with_request_validation(false), registry.clone()).unwrap();
        assert!(matches!(
            lenient.handle_canonical(&req),
            Err(FakeError::NoOverrideAvailable { .. })
        ));

        registry.register_for_path("/pets-not-in-contract", "GET", |_, _| CanonicalResponse::new(204));
        assert_eq!(lenient.handle_canonical(&req).unwrap().status, 204);
    }

    #[test]
    fn test_response_without_content_gets_null_body() {
        let handler = RequestHandler::new(&settings(), Arc::new(CallbackRegistry::new())).unwrap();
        let resp = handler
            .handle_canonical(&CanonicalRequest::new("GET", "http://host/health"))
            .unwrap();
        assert_eq!(resp.body_text(), "null");
    }

    #[test]
    fn test_validation_entry_points_honor_flags() {
        let strict = RequestHandler::new(&settings(), Arc::new(CallbackRegistry::new())).unwrap();
        assert!(strict.validate_request(&get("https://host/nope")).is_err());
        assert!(strict.validate_request(&get("https://host/pets")).is_ok());

        let lenient = RequestHandler::new(
            &settings().with_request_validation(false),
            Arc::new(CallbackRegistry::new()),
        )
        .unwrap();
        assert!(lenient.validate_request(&get("https://host/nope")).is_ok());

        let bad = Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        assert!(matches!(
            strict.validate_response(&get("https://host/pets"), &bad),
            Err(FakeError::ResponseValidationFailed { .. })
        ));
        let no_responses = RequestHandler::new(
            &settings().with_response_validation(false),
            Arc::new(CallbackRegistry::new()),
        )
        .unwrap();
        assert!(no_responses.validate_response(&get("https://host/pets"), &bad).is_ok());
    }

    #[test]
    fn test_requires_contract() {
        let err = RequestHandler::new(&Settings::default(), Arc::new(CallbackRegistry::new())).unwrap_err();
        assert!(matches!(err, FakeError::SchemaNotBound));
    }
}
