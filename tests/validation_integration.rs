//! End-to-end scenario 5: 101 chunks are rejected with the exact spec wording and no
//! store writes occur.

use chunk_materialize::config::ValidationConfig;
use chunk_materialize::model::Chunk;
use chunk_materialize::Validator;

#[test]
fn over_limit_request_is_rejected_with_spec_message() {
    let config = ValidationConfig::default();
    let validator = Validator::new(&config);

    let chunks: Vec<Chunk> = (0..101).map(|i| Chunk::new("valid content", i)).collect();
    let err = validator.validate(&chunks).unwrap_err();

    assert_eq!(
        err.to_string(),
        "validation failed: Too many chunks. Maximum allowed: 100, received: 101"
    );
}

#[test]
fn well_formed_request_at_the_limit_is_accepted() {
    let config = ValidationConfig::default();
    let validator = Validator::new(&config);

    let chunks: Vec<Chunk> = (0..100).map(|i| Chunk::new("valid content", i)).collect();
    assert!(validator.validate(&chunks).is_ok());
}
