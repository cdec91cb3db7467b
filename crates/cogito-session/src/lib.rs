//! Concurrent, versioned store for sequential thinking sessions.
//!
//! Sessions are held in memory as immutable snapshots. Every mutation runs
//! against a private copy and is committed through
//! [`SessionStore::compare_and_swap`], which retries on version conflicts
//! within the bounds of a [`RetryPolicy`].
//!
//! # Main types
//!
//! - [`ThinkingSession`] / [`Thought`] — The session data model.
//! - [`SessionStore`] — Store trait; [`InMemorySessionStore`] implements it.
//! - [`ThinkingService`] — Start, continue, review and read operations.

/// Store, retry and service configuration.
pub mod config;
/// Session and thought data model.
pub mod session;
/// Session store and optimistic update primitive.
pub mod store;
/// Start, continue, review and read operations over a store.
pub mod thinking;

pub use config::{RetryPolicy, StoreConfig, ThinkingConfig};
pub use session::{branch_id, SessionStatus, ThinkingSession, Thought};
pub use store::{InMemorySessionStore, SessionStore, Transform};
pub use thinking::{
    ContinueOutcome, ContinueSessionRequest, ResourceTarget, SessionSummary, StartSessionRequest,
    ThinkingService,
};
