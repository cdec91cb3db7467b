#![allow(clippy::unwrap_used, clippy::expect_used)]

use cogito_core::*;

// ---------------------------------------------------------------------------
// 1. Error Display strings
// ---------------------------------------------------------------------------

#[test]
fn error_display_strings() {
    let not_found = CogitoError::SessionNotFound("abc".to_string());
    assert_eq!(not_found.to_string(), "session abc not found");

    let invalid = CogitoError::InvalidStep(7);
    assert_eq!(invalid.to_string(), "invalid step number: 7");

    let validation = CogitoError::Validation("bad id".to_string());
    assert_eq!(validation.to_string(), "validation error: bad id");

    let exists = CogitoError::AlreadyExists("abc".to_string());
    assert_eq!(exists.to_string(), "session abc already exists");

    let contention = CogitoError::Contention {
        session_id: "abc".to_string(),
        attempts: 9,
    };
    assert_eq!(
        contention.to_string(),
        "too much contention on session abc after 9 attempts"
    );

    let full = CogitoError::CapacityExceeded(10);
    assert_eq!(full.to_string(), "session store is full (10 sessions)");

    let config = CogitoError::Config("missing field".to_string());
    assert_eq!(config.to_string(), "Config error: missing field");
}

// ---------------------------------------------------------------------------
// 2. From impls
// ---------------------------------------------------------------------------

#[test]
fn error_from_impls() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: CogitoError = json_err.into();
    assert!(matches!(err, CogitoError::Json(_)));
    assert!(err.to_string().starts_with("JSON error:"));

    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: CogitoError = io_err.into();
    assert!(matches!(err, CogitoError::Io(_)));
    assert_eq!(err.to_string(), "IO error: gone");
}

// ---------------------------------------------------------------------------
// 3. Client vs. server classification
// ---------------------------------------------------------------------------

#[test]
fn client_error_classification() {
    assert!(CogitoError::SessionNotFound("x".into()).is_client_error());
    assert!(CogitoError::InvalidStep(0).is_client_error());
    assert!(CogitoError::Validation("x".into()).is_client_error());
    assert!(CogitoError::AlreadyExists("x".into()).is_client_error());

    assert!(!CogitoError::CapacityExceeded(1).is_client_error());
    assert!(!CogitoError::Config("x".into()).is_client_error());
    assert!(!CogitoError::Contention {
        session_id: "x".into(),
        attempts: 1
    }
    .is_client_error());
}

// ---------------------------------------------------------------------------
// 4. Generated ids
// ---------------------------------------------------------------------------

#[test]
fn generated_ids_are_distinct_and_well_formed() {
    let a = generate_session_id();
    let b = generate_session_id();
    assert_ne!(a, b);
    for id in [&a, &b] {
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_uppercase() || ('2'..='7').contains(&c)));
    }
}
