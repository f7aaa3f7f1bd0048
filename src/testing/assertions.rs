//! Assertion helpers for engine results

use std::fmt::Debug;

use crate::errors::{ErrorKind, Result};

/// Assert that `result` failed with `kind`
///
/// # Panics
///
/// Panics if the result is `Ok` or carries another error kind.
pub fn assert_error_kind<T: Debug>(result: Result<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {kind} error, got Ok({value:?})"),
        Err(err) => assert!(
            err.is(kind),
            "Expected {kind} error, got {} ({}): {:?}",
            err.kind(),
            err.details(),
            err.debug_info()
        ),
    }
}

/// Assert that `result` failed with `kind` and its details contain `text`
///
/// # Panics
///
/// Panics if the kind differs or the details do not contain `text`.
pub fn assert_error_details<T: Debug>(result: Result<T>, kind: ErrorKind, text: &str) {
    match result {
        Ok(value) => panic!("Expected {kind} error, got Ok({value:?})"),
        Err(err) => {
            assert!(err.is(kind), "Expected {kind} error, got {}", err.kind());
            assert!(
                err.details().contains(text),
                "Expected details containing '{text}', got '{}'",
                err.details()
            );
        }
    }
}
