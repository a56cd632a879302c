//! End-to-end tests of the intercept-and-respond pipeline through an
//! in-process session.

use assert_json_diff::assert_json_include;
use bytes::Bytes;
use hyper::{Request, Response};
use oas_fake::vcr::{InterceptError, LocalInterceptor, Mode, ModeManager};
use oas_fake::{CanonicalResponse, Contract, FakeError, FakerOptions, MismatchKind, Settings};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn petstore() -> Arc<Contract> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/petstore.yaml");
    Arc::new(Contract::from_file(path).expect("petstore fixture"))
}

fn session(dir: &TempDir, settings: Settings) -> ModeManager<LocalInterceptor> {
    let settings = settings
        .with_contract(petstore())
        .with_cassette_path(dir.path());
    let manager = ModeManager::new(LocalInterceptor::new(), settings);
    manager.start().expect("session starts");
    manager
}

fn get(url: &str) -> Request<Bytes> {
    Request::builder().uri(url).body(Bytes::new()).unwrap()
}

fn json_body(response: &Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).expect("JSON body")
}

#[test]
fn test_default_response_is_schema_shaped() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default());

    let response = manager.interceptor().dispatch(&get("https://host/pets")).unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let pets = json_body(&response);
    let pets = pets.as_array().expect("array body");
    assert!(!pets.is_empty());
    for pet in pets {
        assert!(pet["id"].is_i64(), "id in {pet}");
        assert!(pet["name"].is_string(), "name in {pet}");
    }
}

#[test]
fn test_path_callback_replaces_generated_body() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default());
    manager.registry().register_for_path("/pets", "GET", |_, _| {
        CanonicalResponse::json(200, &json!([{"id": 99, "name": "Custom"}]))
    });

    let response = manager.interceptor().dispatch(&get("https://host/pets")).unwrap();
    assert_eq!(json_body(&response), json!([{"id": 99, "name": "Custom"}]));
}

#[test]
fn test_operation_id_callback_for_templated_path() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default());
    manager.registry().register("showPetById", |request, _| {
        let id: i64 = request
            .path()
            .rsplit('/')
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        CanonicalResponse::json(200, &json!({"id": id, "name": "Rex"}))
    });
    manager.registry().register_for_path("/pets/{petId}", "get", |_, _| {
        CanonicalResponse::json(200, &json!({"id": 0, "name": "path"}))
    });

    let response = manager.interceptor().dispatch(&get("http://host/pets/7")).unwrap();
    assert_json_include!(actual: json_body(&response), expected: json!({"id": 7, "name": "Rex"}));
}

#[test]
fn test_unknown_path_with_and_without_request_validation() {
    let dir = TempDir::new().unwrap();
    let strict = session(&dir, Settings::default());
    let err = strict
        .interceptor()
        .dispatch(&get("https://host/pets-not-in-contract"))
        .unwrap_err();
    assert!(matches!(err, FakeError::RequestValidationFailed { .. }));
    assert_eq!(err.mismatch().map(|m| m.kind), Some(MismatchKind::UnknownPath));

    let lenient = session(&dir, Settings::default().with_request_validation(false));
    let handler = lenient.request_handler().unwrap();
    handler
        .validate_request(&get("https://host/pets-not-in-contract"))
        .expect("no validation error with request validation disabled");
}

#[test]
fn test_invalid_request_body_is_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default());
    let request = Request::builder()
        .method("POST")
        .uri("https://host/pets")
        .header("content-type", "application/json")
        .body(Bytes::from_static(br#"{"tag": "no name"}"#))
        .unwrap();
    let err = manager.interceptor().dispatch(&request).unwrap_err();
    assert_eq!(err.mismatch().map(|m| m.kind), Some(MismatchKind::InvalidBody));

    let request = Request::builder()
        .method("POST")
        .uri("https://host/pets")
        .header("content-type", "application/json")
        .body(Bytes::from_static(br#"{"name": "Rex"}"#))
        .unwrap();
    // Generated at 200, which createPet does not declare
    let err = manager.interceptor().dispatch(&request).unwrap_err();
    assert!(matches!(err, FakeError::ResponseValidationFailed { .. }));
}

#[test]
fn test_bad_override_fails_response_validation() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default());
    manager.registry().register("listPets", |_, _| {
        CanonicalResponse::json(200, &json!([{"id": "not-a-number"}]))
    });
    let err = manager.interceptor().dispatch(&get("https://host/pets")).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Response validation failed for GET /pets (status 200)"));
}

#[test]
fn test_faker_options_bound_array_length() {
    let dir = TempDir::new().unwrap();
    let manager = session(
        &dir,
        Settings::default().with_faker(FakerOptions {
            always_fake_optionals: true,
            min_items: Some(3),
            max_items: Some(3),
        }),
    );
    let response = manager.interceptor().dispatch(&get("https://host/pets")).unwrap();
    let pets = json_body(&response);
    assert_eq!(pets.as_array().unwrap().len(), 3);
    assert!(pets[0].get("tag").is_some());
}

#[test]
fn test_passthrough_lets_calls_out() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default().with_mode(Mode::Passthrough));
    let err = manager.interceptor().dispatch(&get("https://host/pets")).unwrap_err();
    assert!(matches!(err, FakeError::Intercept(InterceptError::NotIntercepted)));

    // Real traffic can still be checked against the contract
    let handler = manager.request_handler().unwrap();
    let real = Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(Bytes::from_static(br#"[{"id": 1, "name": "Real"}]"#))
        .unwrap();
    handler.validate_response(&get("https://host/pets"), &real).unwrap();
}

#[test]
fn test_record_mode_persists_exchanges() {
    let dir = TempDir::new().unwrap();
    let manager = session(&dir, Settings::default().with_mode(Mode::Record));
    let request = get("https://host/pets");
    assert!(manager.interceptor().dispatch(&request).is_err());

    let real = Response::builder()
        .status(200)
        .body(Bytes::from_static(b"[]"))
        .unwrap();
    assert!(manager.interceptor().record(&request, &real).unwrap());
    manager.stop().unwrap();

    let cassette: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("recording.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(cassette[0]["request"]["url"], "https://host/pets");
    assert_eq!(cassette[0]["response"]["status"], 200);
}
