//! Core types shared across the Cogito crates.
//!
//! # Main types
//!
//! - [`CogitoError`] — Unified error enum for store, service and CLI failures.
//! - [`CogitoResult`] — Convenience alias for `Result<T, CogitoError>`.
//! - [`generate_session_id`] — Collision-resistant base32 session ids.

/// Error taxonomy for session operations.
pub mod error;
/// Random session identifier generation.
pub mod id;

pub use error::{CogitoError, CogitoResult};
pub use id::{generate_session_id, SESSION_ID_ALPHABET, SESSION_ID_LEN};
