//! The four logical operations exposed to a protocol layer: start, continue,
//! review and read.

use crate::config::ThinkingConfig;
use crate::session::{SessionStatus, ThinkingSession};
use crate::store::SessionStore;
use cogito_core::{generate_session_id, CogitoError, CogitoResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// URI scheme for read-only session resources.
pub const RESOURCE_SCHEME: &str = "thinking";

/// Resource name that lists every session. Reserved as a session id.
pub const ALL_SESSIONS: &str = "sessions";

/// Bare shorthand for [`ALL_SESSIONS`]. Also reserved as a session id.
pub const ALL_SHORTHAND: &str = "all";

/// Arguments for [`ThinkingService::start_session`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    /// Problem statement for the new session.
    pub problem: String,
    /// Caller-chosen id. Generated when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Initial estimate; the configured default applies when absent or zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_steps: Option<u32>,
}

/// Arguments for [`ThinkingService::continue_session`].
///
/// Exactly one sub-behaviour runs per call: a revision when `revise_step` is
/// set, a fork when `create_branch` is true, otherwise an append.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueSessionRequest {
    /// Target session.
    pub session_id: String,
    /// Content to append, or the replacement text for a revision.
    #[serde(default)]
    pub thought: String,
    /// `Some(false)` marks the session completed after appending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_needed: Option<bool>,
    /// 1-based index of the thought to rewrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revise_step: Option<usize>,
    /// Fork the session instead of appending.
    #[serde(default)]
    pub create_branch: bool,
    /// Replaces the session's estimate when positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total: Option<u32>,
}

/// Result of a successful start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Id of the new session, generated or caller-chosen.
    pub session_id: String,
    /// Problem statement as stored.
    pub problem: String,
    /// Estimate in effect after defaults were applied.
    pub estimated_total: u32,
    /// Always `active` for a fresh session.
    pub status: SessionStatus,
    /// Always 0 for a fresh session.
    pub version: u64,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Started thinking session '{}' for problem: {}\nEstimated steps: {}\nReady for your first thought.",
            self.session_id, self.problem, self.estimated_total
        )
    }
}

/// What a continue call did, taken from the committed session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ContinueOutcome {
    /// A thought was added at `index`.
    #[serde(rename_all = "camelCase")]
    Appended {
        /// Session the thought landed in.
        session_id: String,
        /// Index assigned by the committed update.
        index: usize,
        /// Content of the new thought.
        content: String,
        /// Estimate after the update.
        estimated_total: u32,
        /// Status after the update.
        status: SessionStatus,
        /// Version of the committed session.
        version: u64,
    },
    /// Thought `step` was rewritten in place.
    #[serde(rename_all = "camelCase")]
    Revised {
        /// Session that was revised.
        session_id: String,
        /// Index of the rewritten thought.
        step: usize,
        /// Replacement content.
        content: String,
        /// Version of the committed session.
        version: u64,
    },
    /// `branch_id` was forked from `parent_id`.
    #[serde(rename_all = "camelCase")]
    Branched {
        /// Session that was forked.
        parent_id: String,
        /// Id of the new child session.
        branch_id: String,
        /// Parent version after registering the branch.
        parent_version: u64,
    },
}

impl fmt::Display for ContinueOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContinueOutcome::Appended {
                session_id,
                index,
                content,
                estimated_total,
                status,
                ..
            } => {
                write!(f, "Session '{session_id}' - Step {index}")?;
                if *estimated_total > 0 {
                    write!(f, " of ~{estimated_total}")?;
                }
                write!(f, ":\n{content}")?;
                if *status == SessionStatus::Completed {
                    f.write_str("\n✓ Thinking process completed!")
                } else {
                    f.write_str("\nReady for next thought...")
                }
            }
            ContinueOutcome::Revised {
                session_id,
                step,
                content,
                ..
            } => write!(f, "Revised step {step} in session '{session_id}':\n{content}"),
            ContinueOutcome::Branched {
                parent_id,
                branch_id,
                ..
            } => write!(
                f,
                "Created branch '{branch_id}' from session '{parent_id}'. You can now continue thinking in either session."
            ),
        }
    }
}

/// Which sessions a resource URI names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceTarget {
    /// Every stored session.
    All,
    /// One session by id.
    Session(String),
}

impl ResourceTarget {
    /// Parse `thinking://sessions`, `thinking://{id}`, a bare id, or `all`.
    pub fn parse(uri: &str) -> CogitoResult<Self> {
        let name = match uri.split_once("://") {
            Some((scheme, rest)) => {
                if scheme != RESOURCE_SCHEME {
                    return Err(CogitoError::Validation(format!(
                        "invalid thinking resource URI scheme: {scheme}"
                    )));
                }
                // Only the authority names a session; any path is ignored.
                rest.split('/').next().unwrap_or_default()
            }
            None if uri == ALL_SHORTHAND => ALL_SESSIONS,
            None => uri,
        };
        if name.is_empty() {
            return Err(CogitoError::Validation(format!(
                "invalid thinking resource URI: {uri}"
            )));
        }
        if name == ALL_SESSIONS {
            Ok(ResourceTarget::All)
        } else {
            Ok(ResourceTarget::Session(name.to_string()))
        }
    }
}

/// Caller-chosen ids must stay addressable as resources and must not collide
/// with ids the service derives for branches.
fn validate_session_id(id: &str) -> CogitoResult<()> {
    if id == ALL_SESSIONS || id == ALL_SHORTHAND {
        return Err(CogitoError::Validation(format!(
            "session id '{id}' is reserved"
        )));
    }
    if id.contains("_branch_") {
        return Err(CogitoError::Validation(format!(
            "session id '{id}' must not contain '_branch_'"
        )));
    }
    if id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(CogitoError::Validation(format!(
            "session id '{id}' must not contain '/' or whitespace"
        )));
    }
    Ok(())
}

/// Entry point for session operations. Cheap to clone; every clone shares the
/// same store.
#[derive(Clone)]
pub struct ThinkingService {
    store: Arc<dyn SessionStore>,
    config: ThinkingConfig,
}

impl ThinkingService {
    /// Service over `store`, applying the defaults in `config`.
    pub fn new(store: Arc<dyn SessionStore>, config: ThinkingConfig) -> Self {
        Self { store, config }
    }

    /// The shared backing store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Begin a new session with an empty thought sequence.
    pub async fn start_session(&self, req: StartSessionRequest) -> CogitoResult<SessionSummary> {
        let session_id = match req.session_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                validate_session_id(&id)?;
                id
            }
            None => generate_session_id(),
        };
        let estimated = req
            .estimated_steps
            .filter(|n| *n > 0)
            .unwrap_or(self.config.default_estimated_steps);

        let session = ThinkingSession::new(session_id, req.problem, estimated);
        let summary = SessionSummary {
            session_id: session.id.clone(),
            problem: session.problem.clone(),
            estimated_total: session.estimated_total,
            status: session.status,
            version: session.version,
        };
        self.store.create(session).await?;

        info!(session_id = %summary.session_id, estimated_steps = estimated, "Thinking session started");
        Ok(summary)
    }

    /// Append, revise or branch, depending on which fields of `req` are set.
    pub async fn continue_session(
        &self,
        req: ContinueSessionRequest,
    ) -> CogitoResult<ContinueOutcome> {
        match (req.revise_step, req.create_branch) {
            (Some(_), true) => Err(CogitoError::Validation(
                "reviseStep and createBranch cannot be combined".to_string(),
            )),
            (Some(step), false) => self.revise(&req.session_id, step, &req.thought).await,
            (None, true) => self.branch(&req.session_id).await,
            (None, false) => self.append(req).await,
        }
    }

    async fn append(&self, req: ContinueSessionRequest) -> CogitoResult<ContinueOutcome> {
        let estimate = req.estimated_total.filter(|n| *n > 0);
        let complete = req.next_needed == Some(false);
        let content = req.thought;

        let committed = self
            .store
            .compare_and_swap(&req.session_id, &|session| {
                session.push_thought(content.as_str());
                if let Some(total) = estimate {
                    session.estimated_total = total;
                }
                if complete {
                    session.status = SessionStatus::Completed;
                }
                Ok(())
            })
            .await?;

        let index = committed.current_thought;
        let content = committed
            .thoughts
            .get(index.saturating_sub(1))
            .map(|t| t.content.clone())
            .unwrap_or(content);
        Ok(ContinueOutcome::Appended {
            session_id: committed.id,
            index,
            content,
            estimated_total: committed.estimated_total,
            status: committed.status,
            version: committed.version,
        })
    }

    async fn revise(
        &self,
        session_id: &str,
        step: usize,
        content: &str,
    ) -> CogitoResult<ContinueOutcome> {
        let committed = self
            .store
            .compare_and_swap(session_id, &|session| {
                if session.revise_thought(step, content) {
                    Ok(())
                } else {
                    Err(CogitoError::InvalidStep(step))
                }
            })
            .await?;

        Ok(ContinueOutcome::Revised {
            session_id: committed.id,
            step,
            content: content.to_string(),
            version: committed.version,
        })
    }

    /// Register a branch on the parent, then insert the forked child.
    ///
    /// The two writes touch different keys and are not atomic together: if the
    /// child insert fails, the parent keeps a branch id with no session behind
    /// it.
    async fn branch(&self, parent_id: &str) -> CogitoResult<ContinueOutcome> {
        let parent = self
            .store
            .compare_and_swap(parent_id, &|session| {
                session.register_branch();
                Ok(())
            })
            .await?;

        let branch_id = parent.branches.last().cloned().ok_or_else(|| {
            CogitoError::Validation(format!("session {parent_id} recorded no branch"))
        })?;
        let child = parent.fork(branch_id.as_str());

        if let Err(e) = self.store.set(child).await {
            warn!(
                parent_id,
                branch_id = %branch_id,
                error = %e,
                "Branch registered on parent but child session could not be stored"
            );
            return Err(e);
        }

        info!(parent_id, branch_id = %branch_id, thoughts = parent.thoughts.len(), "Session branched");
        Ok(ContinueOutcome::Branched {
            parent_id: parent.id,
            branch_id,
            parent_version: parent.version,
        })
    }

    /// Human-readable transcript of a session.
    pub async fn review_session(&self, session_id: &str) -> CogitoResult<String> {
        let session = self
            .store
            .snapshot(session_id)
            .await
            .ok_or_else(|| CogitoError::SessionNotFound(session_id.to_string()))?;
        Ok(render_review(&session))
    }

    /// JSON view of one session or of all sessions.
    pub async fn read_resource(&self, uri: &str) -> CogitoResult<String> {
        let json = match ResourceTarget::parse(uri)? {
            ResourceTarget::All => serde_json::to_string_pretty(&self.store.snapshot_all().await)?,
            ResourceTarget::Session(id) => {
                let session = self
                    .store
                    .snapshot(&id)
                    .await
                    .ok_or(CogitoError::SessionNotFound(id))?;
                serde_json::to_string_pretty(&session)?
            }
        };
        Ok(json)
    }
}

fn render_review(session: &ThinkingSession) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Thinking Review: {} ===\n", session.id));
    out.push_str(&format!("Problem: {}\n", session.problem));
    out.push_str(&format!("Status: {}\n", session.status));
    out.push_str(&format!(
        "Steps: {} of ~{}\n",
        session.thoughts.len(),
        session.estimated_total
    ));
    if !session.branches.is_empty() {
        out.push_str(&format!("Branches: {}\n", session.branches.join(", ")));
    }
    out.push_str("\n--- Thought Sequence ---\n");
    for thought in &session.thoughts {
        let marker = if thought.revised { " (revised)" } else { "" };
        out.push_str(&format!(
            "{}. {}{}\n",
            thought.index, thought.content, marker
        ));
    }
    out
}
