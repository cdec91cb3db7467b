use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to a parent's problem statement when it is forked.
pub const BRANCH_PROBLEM_SUFFIX: &str = " (Alternative branch)";

/// One reasoning step inside a [`ThinkingSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    /// 1-based position within the session.
    pub index: usize,
    /// Text of the step.
    pub content: String,
    /// When the thought was first recorded.
    pub created: DateTime<Utc>,
    /// Set once the thought has been rewritten through a revision.
    pub revised: bool,
    /// Thought this one forked from; `None` for a session's own thoughts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_index: Option<usize>,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting thoughts.
    #[default]
    Active,
    /// The caller signalled that no further thought is needed.
    Completed,
    /// Suspended; no operation currently sets this.
    Paused,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// A problem, its ordered thought sequence, and the bookkeeping needed for
/// optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingSession {
    /// Store key; immutable once the session exists.
    pub id: String,
    /// Problem statement the session reasons about.
    pub problem: String,
    /// Thoughts ordered by index, starting at 1.
    pub thoughts: Vec<Thought>,
    /// Index of the most recently added thought (0 while empty).
    pub current_thought: usize,
    /// Advisory estimate of how many steps the problem needs.
    pub estimated_total: u32,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Time of the last committed change.
    pub last_activity: DateTime<Utc>,
    /// Ids of sessions forked from this one, in creation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
    /// Incremented by the store on every committed update.
    pub version: u64,
}

impl ThinkingSession {
    /// A fresh, empty, active session at version 0.
    pub fn new(id: impl Into<String>, problem: impl Into<String>, estimated_total: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            problem: problem.into(),
            thoughts: Vec::new(),
            current_thought: 0,
            estimated_total,
            status: SessionStatus::Active,
            created: now,
            last_activity: now,
            branches: Vec::new(),
            version: 0,
        }
    }

    /// Append a new thought and make it current. Returns its index.
    pub fn push_thought(&mut self, content: impl Into<String>) -> usize {
        let now = Utc::now();
        let index = self.thoughts.len() + 1;
        self.thoughts.push(Thought {
            index,
            content: content.into(),
            created: now,
            revised: false,
            parent_index: None,
        });
        self.current_thought = index;
        self.last_activity = now;
        index
    }

    /// Rewrite thought `step` (1-based). Returns `false` when `step` is out of
    /// range, in which case nothing changes.
    pub fn revise_thought(&mut self, step: usize, content: impl Into<String>) -> bool {
        let Some(thought) = step
            .checked_sub(1)
            .and_then(|pos| self.thoughts.get_mut(pos))
        else {
            return false;
        };
        thought.content = content.into();
        thought.revised = true;
        self.last_activity = Utc::now();
        true
    }

    /// Register the next branch id and return it.
    ///
    /// The id is derived from the current branch count, so two registrations
    /// against the same committed state always produce the same id; the
    /// store's version check is what keeps concurrent forks apart.
    pub fn register_branch(&mut self) -> String {
        let branch_id = branch_id(&self.id, self.branches.len() + 1);
        self.branches.push(branch_id.clone());
        self.last_activity = Utc::now();
        branch_id
    }

    /// Build the child session for `branch_id` from this session's current
    /// thoughts. The child starts at version 0 with no branches of its own.
    pub fn fork(&self, branch_id: impl Into<String>) -> ThinkingSession {
        let mut child = ThinkingSession::new(
            branch_id,
            format!("{}{BRANCH_PROBLEM_SUFFIX}", self.problem),
            self.estimated_total,
        );
        child.thoughts = self.thoughts.clone();
        child.current_thought = child.thoughts.len();
        child
    }

    /// Number of thoughts recorded so far.
    pub fn thought_count(&self) -> usize {
        self.thoughts.len()
    }

    /// Whether the session has been marked completed.
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }
}

/// Branch id for the `ordinal`-th fork of `parent_id`.
pub fn branch_id(parent_id: &str, ordinal: usize) -> String {
    format!("{parent_id}_branch_{ordinal}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty_and_active() {
        let s = ThinkingSession::new("s1", "P", 3);
        assert!(s.thoughts.is_empty());
        assert_eq!(s.current_thought, 0);
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.version, 0);
        assert!(s.branches.is_empty());
        assert_eq!(s.created, s.last_activity);
    }

    #[test]
    fn test_push_thought_assigns_contiguous_indices() {
        let mut s = ThinkingSession::new("s1", "P", 3);
        assert_eq!(s.push_thought("a"), 1);
        assert_eq!(s.push_thought("b"), 2);
        assert_eq!(s.push_thought("c"), 3);
        assert_eq!(s.current_thought, 3);
        for (pos, t) in s.thoughts.iter().enumerate() {
            assert_eq!(t.index, pos + 1);
            assert!(!t.revised);
            assert!(t.parent_index.is_none());
        }
    }

    #[test]
    fn test_revise_thought_bounds() {
        let mut s = ThinkingSession::new("s1", "P", 3);
        s.push_thought("a");
        s.push_thought("b");

        assert!(!s.revise_thought(0, "x"));
        assert!(!s.revise_thought(3, "x"));
        assert_eq!(s.thoughts[0].content, "a");
        assert_eq!(s.thoughts[1].content, "b");

        assert!(s.revise_thought(2, "b2"));
        assert_eq!(s.thoughts[1].content, "b2");
        assert!(s.thoughts[1].revised);
        assert!(!s.thoughts[0].revised);
        assert_eq!(s.thoughts[1].index, 2);
    }

    #[test]
    fn test_register_branch_counts_up() {
        let mut s = ThinkingSession::new("root", "P", 3);
        assert_eq!(s.register_branch(), "root_branch_1");
        assert_eq!(s.register_branch(), "root_branch_2");
        assert_eq!(s.branches, vec!["root_branch_1", "root_branch_2"]);
    }

    #[test]
    fn test_fork_copies_history() {
        let mut s = ThinkingSession::new("root", "P", 4);
        s.push_thought("a");
        s.push_thought("b");
        s.status = SessionStatus::Completed;
        s.version = 7;
        s.branches.push("other".into());

        let child = s.fork("root_branch_1");
        assert_eq!(child.id, "root_branch_1");
        assert_eq!(child.problem, "P (Alternative branch)");
        assert_eq!(child.thoughts, s.thoughts);
        assert_eq!(child.current_thought, 2);
        assert_eq!(child.estimated_total, 4);
        assert_eq!(child.status, SessionStatus::Active);
        assert_eq!(child.version, 0);
        assert!(child.branches.is_empty());
    }

    #[test]
    fn test_json_uses_camel_case_and_omits_empty() {
        let mut s = ThinkingSession::new("s1", "P", 3);
        s.push_thought("a");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["currentThought"], 1);
        assert_eq!(json["estimatedTotal"], 3);
        assert_eq!(json["status"], "active");
        assert!(json.get("lastActivity").is_some());
        assert!(json.get("branches").is_none());
        assert!(json["thoughts"][0].get("parentIndex").is_none());

        let back: ThinkingSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
