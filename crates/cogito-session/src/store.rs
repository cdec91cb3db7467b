use crate::config::{RetryPolicy, StoreConfig};
use crate::session::ThinkingSession;
use async_trait::async_trait;
use cogito_core::{CogitoError, CogitoResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A pure state transition applied by [`SessionStore::compare_and_swap`].
///
/// The store may call it several times for a single logical update, once per
/// attempt. Callers must keep it free of observable side effects; the `Fn`
/// bound does not enforce this, since interior mutability still gets through.
/// Anything derived for the caller (response text, counters) belongs after the
/// call returns.
pub type Transform<'a> = &'a (dyn Fn(&mut ThinkingSession) -> CogitoResult<()> + Send + Sync);

/// Keyed registry of thinking sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Internal read handle. The session behind the `Arc` is never mutated;
    /// commits replace it wholesale.
    async fn get(&self, id: &str) -> Option<Arc<ThinkingSession>>;

    /// Unconditional upsert of a brand-new session.
    async fn set(&self, session: ThinkingSession) -> CogitoResult<()>;

    /// Insert a session, failing with [`CogitoError::AlreadyExists`] if the
    /// id is taken.
    async fn create(&self, session: ThinkingSession) -> CogitoResult<()>;

    /// Deep copies of every stored session, ordered by creation time then id.
    async fn snapshot_all(&self) -> Vec<ThinkingSession>;

    /// Number of stored sessions.
    async fn len(&self) -> usize;

    /// Apply `transform` to a private copy of session `id` and commit it only
    /// if nobody else committed in between, retrying on conflict. Returns a
    /// copy of the committed state.
    async fn compare_and_swap(
        &self,
        id: &str,
        transform: Transform<'_>,
    ) -> CogitoResult<ThinkingSession>;

    /// Deep copy of one session, independent of store state.
    async fn snapshot(&self, id: &str) -> Option<ThinkingSession> {
        self.get(id).await.map(|s| ThinkingSession::clone(&s))
    }

    /// Whether the store holds no session.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-process, volatile session store.
///
/// Locks are only held for map lookups and the final version check; deep
/// copies and transforms run with no lock taken.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<ThinkingSession>>>,
    config: StoreConfig,
    retry: RetryPolicy,
}

impl InMemorySessionStore {
    /// Unbounded store with the default retry policy.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default(), RetryPolicy::default())
    }

    /// Store with explicit capacity and retry settings.
    pub fn with_config(config: StoreConfig, retry: RetryPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
            retry,
        }
    }

    /// Retry policy applied by `compare_and_swap`.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    async fn insert(&self, session: ThinkingSession, overwrite: bool) -> CogitoResult<()> {
        let displaced = {
            let mut sessions = self.sessions.write().await;
            let exists = sessions.contains_key(&session.id);
            if exists && !overwrite {
                return Err(CogitoError::AlreadyExists(session.id));
            }
            if !exists {
                if let Some(max) = self.config.max_sessions {
                    if sessions.len() >= max {
                        return Err(CogitoError::CapacityExceeded(max));
                    }
                }
            }
            sessions.insert(session.id.clone(), Arc::new(session))
        };
        drop(displaced);
        Ok(())
    }

    /// Commit `updated` as version `base_version + 1` if the stored session is
    /// still at `base_version`. `Ok(None)` signals a conflict.
    ///
    /// On success the displaced session is handed back alongside the committed
    /// one, so the last reference to it is released outside the write lock.
    async fn try_commit(
        &self,
        base_version: u64,
        mut updated: ThinkingSession,
    ) -> CogitoResult<Option<(Arc<ThinkingSession>, Arc<ThinkingSession>)>> {
        let mut sessions = self.sessions.write().await;
        let current = sessions
            .get(&updated.id)
            .ok_or_else(|| CogitoError::SessionNotFound(updated.id.clone()))?;
        if current.version != base_version {
            return Ok(None);
        }
        updated.version = base_version + 1;
        let committed = Arc::new(updated);
        let displaced = sessions.insert(committed.id.clone(), Arc::clone(&committed));
        Ok(displaced.map(|old| (committed, old)))
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject transforms that break invariants the store relies on.
fn check_transition(before: &ThinkingSession, after: &ThinkingSession) -> CogitoResult<()> {
    if after.id != before.id {
        return Err(CogitoError::Validation(format!(
            "transform changed session id from {} to {}",
            before.id, after.id
        )));
    }
    if !after.branches.starts_with(&before.branches) {
        return Err(CogitoError::Validation(format!(
            "transform removed branches from session {}",
            before.id
        )));
    }
    if let Some((pos, thought)) = after
        .thoughts
        .iter()
        .enumerate()
        .find(|(pos, t)| t.index != pos + 1)
    {
        return Err(CogitoError::Validation(format!(
            "thought at position {} has index {} in session {}",
            pos + 1,
            thought.index,
            before.id
        )));
    }
    Ok(())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Option<Arc<ThinkingSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn set(&self, session: ThinkingSession) -> CogitoResult<()> {
        self.insert(session, true).await
    }

    async fn create(&self, session: ThinkingSession) -> CogitoResult<()> {
        self.insert(session, false).await
    }

    async fn snapshot_all(&self) -> Vec<ThinkingSession> {
        let handles: Vec<Arc<ThinkingSession>> =
            self.sessions.read().await.values().cloned().collect();
        let mut sessions: Vec<ThinkingSession> = handles
            .iter()
            .map(|s| ThinkingSession::clone(s))
            .collect();
        sessions.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        transform: Transform<'_>,
    ) -> CogitoResult<ThinkingSession> {
        let max_attempts = self.retry.max_attempts();

        for attempt in 0..max_attempts {
            let current = self
                .get(id)
                .await
                .ok_or_else(|| CogitoError::SessionNotFound(id.to_string()))?;
            let base_version = current.version;

            let mut working = ThinkingSession::clone(&current);
            transform(&mut working)?;
            check_transition(&current, &working)?;
            drop(current);

            match self.try_commit(base_version, working).await? {
                Some((committed, displaced)) => {
                    drop(displaced);
                    debug!(
                        session_id = id,
                        version = committed.version,
                        attempt,
                        "Session update committed"
                    );
                    return Ok(ThinkingSession::clone(&committed));
                }
                None => {
                    debug!(session_id = id, base_version, attempt, "Version conflict, retrying");
                    if attempt + 1 < max_attempts {
                        let delay = self.retry.backoff(attempt);
                        if delay.is_zero() {
                            tokio::task::yield_now().await;
                        } else {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        warn!(
            session_id = id,
            attempts = max_attempts,
            "Giving up on session update after repeated version conflicts"
        );
        Err(CogitoError::Contention {
            session_id: id.to_string(),
            attempts: max_attempts,
        })
    }
}
