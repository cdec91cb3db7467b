//! Concurrent append storm against a single session.

use cogito_core::CogitoError;
use cogito_session::{
    ContinueOutcome, ContinueSessionRequest, StartSessionRequest, ThinkingService,
};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StressReport {
    pub session_id: String,
    pub tasks: usize,
    pub committed: usize,
    /// Appends that gave up with [`CogitoError::Contention`].
    pub contended: usize,
    pub final_version: u64,
    pub thoughts: usize,
    /// Indices are exactly `1..=committed` and the version matches.
    pub consistent: bool,
    pub elapsed: Duration,
}

impl fmt::Display for StressReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "session:     {}", self.session_id)?;
        writeln!(f, "tasks:       {}", self.tasks)?;
        writeln!(f, "committed:   {}", self.committed)?;
        writeln!(f, "contended:   {}", self.contended)?;
        writeln!(f, "thoughts:    {}", self.thoughts)?;
        writeln!(f, "version:     {}", self.final_version)?;
        writeln!(f, "elapsed:     {:?}", self.elapsed)?;
        write!(
            f,
            "consistent:  {}",
            if self.consistent { "yes" } else { "NO" }
        )
    }
}

/// Start a session and fire `tasks` concurrent appends at it.
pub async fn run_stress(
    service: &ThinkingService,
    tasks: usize,
    problem: String,
) -> anyhow::Result<StressReport> {
    let session_id = service
        .start_session(StartSessionRequest {
            problem,
            session_id: None,
            estimated_steps: u32::try_from(tasks).ok(),
        })
        .await?
        .session_id;

    let started = Instant::now();
    let mut set = JoinSet::new();
    for i in 0..tasks {
        let service = service.clone();
        let session_id = session_id.clone();
        set.spawn(async move {
            service
                .continue_session(ContinueSessionRequest {
                    session_id,
                    thought: format!("thought from task {i}"),
                    next_needed: Some(true),
                    ..Default::default()
                })
                .await
        });
    }

    let mut committed = 0;
    let mut contended = 0;
    while let Some(joined) = set.join_next().await {
        match joined? {
            Ok(ContinueOutcome::Appended { .. }) => committed += 1,
            Ok(other) => warn!(?other, "Unexpected outcome from append"),
            Err(CogitoError::Contention { .. }) => contended += 1,
            Err(e) => return Err(e.into()),
        }
    }
    let elapsed = started.elapsed();

    let session = service
        .store()
        .snapshot(&session_id)
        .await
        .ok_or_else(|| CogitoError::SessionNotFound(session_id.clone()))?;
    let contiguous = session
        .thoughts
        .iter()
        .enumerate()
        .all(|(pos, t)| t.index == pos + 1);
    let consistent = contiguous
        && session.thoughts.len() == committed
        && session.version == committed as u64;

    Ok(StressReport {
        session_id,
        tasks,
        committed,
        contended,
        final_version: session.version,
        thoughts: session.thoughts.len(),
        consistent,
        elapsed,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cogito_session::{InMemorySessionStore, ThinkingConfig};
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stress_is_consistent() {
        let service = ThinkingService::new(
            Arc::new(InMemorySessionStore::new()),
            ThinkingConfig::default(),
        );
        let report = run_stress(&service, 32, "stress".into()).await.unwrap();
        assert!(report.consistent, "{report}");
        assert_eq!(report.committed, 32);
        assert_eq!(report.contended, 0);
        assert_eq!(report.final_version, 32);
        assert!(report.to_string().ends_with("consistent:  yes"));
    }

    #[tokio::test]
    async fn test_stress_with_zero_tasks() {
        let service = ThinkingService::new(
            Arc::new(InMemorySessionStore::new()),
            ThinkingConfig::default(),
        );
        let report = run_stress(&service, 0, "idle".into()).await.unwrap();
        assert!(report.consistent);
        assert_eq!(report.final_version, 0);
    }
}
