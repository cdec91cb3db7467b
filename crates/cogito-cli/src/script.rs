//! JSON-lines command scripts.
//!
//! Each non-blank line not starting with `#` is one command, tagged by `op`:
//!
//! ```text
//! {"op":"start","problem":"P","estimatedSteps":3}
//! {"op":"continue","sessionId":"$last","thought":"step1","nextNeeded":true}
//! {"op":"review","sessionId":"$last"}
//! {"op":"read","uri":"thinking://sessions"}
//! ```

use cogito_core::CogitoResult;
use cogito_session::{ContinueSessionRequest, StartSessionRequest, ThinkingService};
use serde::Deserialize;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

/// Placeholder resolved to the id of the most recently started session.
pub const LAST_SESSION: &str = "$last";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ScriptCommand {
    Start(StartSessionRequest),
    Continue(ContinueSessionRequest),
    Review {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    Read {
        uri: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptReport {
    pub executed: usize,
    pub failed: usize,
}

pub struct ScriptRunner {
    service: ThinkingService,
    last_session: Option<String>,
}

impl ScriptRunner {
    pub fn new(service: ThinkingService) -> Self {
        Self {
            service,
            last_session: None,
        }
    }

    fn resolve(&self, session_id: String) -> String {
        match (&self.last_session, session_id.as_str()) {
            (Some(last), LAST_SESSION) => last.clone(),
            _ => session_id,
        }
    }

    /// Run one command and return the text to show for it.
    pub async fn execute(&mut self, command: ScriptCommand) -> CogitoResult<String> {
        match command {
            ScriptCommand::Start(req) => {
                let summary = self.service.start_session(req).await?;
                self.last_session = Some(summary.session_id.clone());
                Ok(summary.to_string())
            }
            ScriptCommand::Continue(mut req) => {
                req.session_id = self.resolve(req.session_id);
                Ok(self.service.continue_session(req).await?.to_string())
            }
            ScriptCommand::Review { session_id } => {
                let id = self.resolve(session_id);
                self.service.review_session(&id).await
            }
            ScriptCommand::Read { uri } => {
                let uri = match self.last_session.as_deref() {
                    Some(last) => uri.replace(LAST_SESSION, last),
                    None => uri,
                };
                self.service.read_resource(&uri).await
            }
        }
    }

    /// Execute every command from `input`, writing responses to `out`.
    ///
    /// A failing command is reported inline and does not stop the script;
    /// only I/O errors do.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> CogitoResult<ScriptReport>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut report = ScriptReport::default();
        let mut lines = input.lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            report.executed += 1;

            let result = match serde_json::from_str::<ScriptCommand>(line) {
                Ok(command) => {
                    debug!(line = line_no, ?command, "Executing script command");
                    self.execute(command).await
                }
                Err(e) => Err(e.into()),
            };
            match result {
                Ok(text) => writeln!(out, "{text}")?,
                Err(e) => {
                    report.failed += 1;
                    writeln!(out, "error: {e}")?;
                }
            }
        }
        out.flush()?;
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use cogito_session::{InMemorySessionStore, ThinkingConfig};
    use std::sync::Arc;

    fn runner() -> ScriptRunner {
        ScriptRunner::new(ThinkingService::new(
            Arc::new(InMemorySessionStore::new()),
            ThinkingConfig::default(),
        ))
    }

    #[test]
    fn test_parse_commands() {
        let cmd: ScriptCommand =
            serde_json::from_str(r#"{"op":"start","problem":"P","estimatedSteps":3}"#).unwrap();
        match cmd {
            ScriptCommand::Start(req) => {
                assert_eq!(req.problem, "P");
                assert_eq!(req.estimated_steps, Some(3));
                assert!(req.session_id.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }

        let cmd: ScriptCommand = serde_json::from_str(
            r#"{"op":"continue","sessionId":"s","thought":"t","reviseStep":2}"#,
        )
        .unwrap();
        match cmd {
            ScriptCommand::Continue(req) => {
                assert_eq!(req.session_id, "s");
                assert_eq!(req.revise_step, Some(2));
                assert!(!req.create_branch);
            }
            other => panic!("unexpected {other:?}"),
        }

        let cmd: ScriptCommand =
            serde_json::from_str(r#"{"op":"review","sessionId":"s"}"#).unwrap();
        assert!(matches!(cmd, ScriptCommand::Review { session_id } if session_id == "s"));

        assert!(serde_json::from_str::<ScriptCommand>(r#"{"op":"delete"}"#).is_err());
    }

    #[tokio::test]
    async fn test_run_script_end_to_end() {
        let script = r#"
# scenario
{"op":"start","problem":"P","sessionId":"demo","estimatedSteps":3}
{"op":"continue","sessionId":"$last","thought":"step1","nextNeeded":true}
{"op":"continue","sessionId":"$last","thought":"step2","nextNeeded":false}
{"op":"continue","sessionId":"$last","thought":"step1-revised","reviseStep":1}
{"op":"continue","sessionId":"demo","thought":"x","reviseStep":9}
{"op":"review","sessionId":"$last"}
not json
"#;
        let mut runner = runner();
        let mut out = Vec::new();
        let report = runner.run(script.as_bytes(), &mut out).await.unwrap();
        assert_eq!(
            report,
            ScriptReport {
                executed: 7,
                failed: 2
            }
        );

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Started thinking session 'demo' for problem: P"));
        assert!(text.contains("Session 'demo' - Step 2 of ~3:\nstep2\n✓ Thinking process completed!"));
        assert!(text.contains("error: invalid step number: 9"));
        assert!(text.contains("1. step1-revised (revised)"));
        assert!(text.contains("error: JSON error:"));

        let session = runner.service.store().snapshot("demo").await.unwrap();
        assert_eq!(session.version, 3);
    }

    #[tokio::test]
    async fn test_last_placeholder_in_resource_uri() {
        let mut runner = runner();
        runner
            .execute(ScriptCommand::Start(StartSessionRequest {
                problem: "P".into(),
                session_id: Some("abc".into()),
                estimated_steps: None,
            }))
            .await
            .unwrap();
        let json = runner
            .execute(ScriptCommand::Read {
                uri: "thinking://$last".into(),
            })
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["id"], "abc");
    }
}
