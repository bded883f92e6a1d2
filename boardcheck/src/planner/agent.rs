//! Subprocess planning agent.
//!
//! The agent script reads one JSON request from stdin and prints its answer
//! as the last line of stdout. Earlier stdout lines are treated as log noise.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::PlannerConfig;
use crate::planner::{PlannerError, PlanningEngine, PlanningRequest};

pub struct AgentPlanner {
    config: PlannerConfig,
}

impl AgentPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    async fn exchange(&self, body: Vec<u8>) -> Result<Value, PlannerError> {
        let mut child = Command::new(&self.config.command)
            .arg(&self.config.script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Feed stdin while draining stdout/stderr so a chatty agent cannot
        // fill its output pipes while we are still writing the request.
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&body).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        match fed {
            // An agent may exit without reading its whole request.
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                tracing::debug!("Planning agent closed stdin early");
            }
            other => other?,
        }

        if !output.status.success() {
            return Err(PlannerError::Exit {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_agent_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or(PlannerError::InvalidJson)
    }
}

#[async_trait]
impl PlanningEngine for AgentPlanner {
    fn name(&self) -> &str {
        "agent"
    }

    async fn plan(&self, request: &PlanningRequest) -> Result<Value, PlannerError> {
        let body = serde_json::to_vec(request)?;
        tracing::debug!(
            "Running planning agent: {} {} ({} bytes)",
            self.config.command,
            self.config.script_path.display(),
            body.len()
        );

        let timeout = self.config.timeout();
        // Dropping the exchange future drops the child, which kills it.
        match tokio::time::timeout(timeout, self.exchange(body)).await {
            Ok(result) => result,
            Err(_) => Err(PlannerError::Timeout(timeout.as_secs())),
        }
    }
}

/// Parse the last non-empty stdout line as a JSON object. Any other JSON
/// value (`null`, `false`, numbers, arrays) is not an answer.
pub fn parse_agent_output(output: &str) -> Option<Value> {
    let last = output.lines().map(str::trim).filter(|l| !l.is_empty()).last()?;
    match serde_json::from_str(last).ok()? {
        answer @ Value::Object(_) => Some(answer),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{PayloadFile, PlanningContext};
    use std::path::PathBuf;

    fn planner(command: &str, script: PathBuf, timeout_secs: u64) -> AgentPlanner {
        AgentPlanner::new(PlannerConfig {
            command: command.to_string(),
            script_path: script,
            timeout_secs,
            ..Default::default()
        })
    }

    fn request() -> PlanningRequest {
        PlanningRequest::firmware(PlanningContext {
            validation_id: "v1".to_string(),
            ..Default::default()
        })
    }

    fn script(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("agent.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_last_line() {
        let out = "loading index...\n{\"a\": 1}\n\n";
        assert_eq!(parse_agent_output(out).unwrap()["a"], 1);
        assert!(parse_agent_output("").is_none());
        assert!(parse_agent_output("{\"a\": 1}\nnot json").is_none());
    }

    #[test]
    fn test_parse_rejects_non_object_answers() {
        for line in ["null", "false", "0", "[1, 2]", "\"plan\""] {
            assert!(parse_agent_output(line).is_none(), "accepted {}", line);
        }
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let p = planner("/nonexistent/boardcheck-python", PathBuf::from("agent.py"), 5);
        let err = p.plan(&request()).await.unwrap_err();
        assert!(matches!(err, PlannerError::Io(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(
            &dir,
            "cat > /dev/null\necho 'warming up'\necho '{\"notes\": [\"ok\"]}'\n",
        );
        let answer = planner("sh", path, 10).plan(&request()).await.unwrap();
        assert_eq!(answer["notes"][0], "ok");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "cat > /dev/null\necho 'boom' >&2\nexit 3\n");
        let err = planner("sh", path, 10).plan(&request()).await.unwrap_err();
        match err {
            PlannerError::Exit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "cat > /dev/null\necho 'plain text'\n");
        let err = planner("sh", path, 10).plan(&request()).await.unwrap_err();
        assert!(matches!(err, PlannerError::InvalidJson));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_null_answer_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "cat > /dev/null\necho null\n");
        let err = planner("sh", path, 10).plan(&request()).await.unwrap_err();
        assert!(matches!(err, PlannerError::InvalidJson));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_logging_before_reading_large_request() {
        let dir = tempfile::tempdir().unwrap();
        // Well past a pipe buffer on both sides.
        let path = script(
            &dir,
            "head -c 300000 /dev/zero | tr '\\0' x >&2\ncat > /dev/null\necho '{\"notes\": [\"big\"]}'\n",
        );
        let mut request = request();
        request.context.files.push(PayloadFile {
            name: "board.kicad_pcb".to_string(),
            ext: ".kicad_pcb".to_string(),
            size: 400_000,
            content: "(".repeat(400_000),
            truncated: false,
        });

        let answer = planner("sh", path, 10).plan(&request).await.unwrap();
        assert_eq!(answer["notes"][0], "big");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_agent_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = script(&dir, "cat > /dev/null\nsleep 10\n");
        let err = planner("sh", path, 1).plan(&request()).await.unwrap_err();
        assert!(matches!(err, PlannerError::Timeout(1)));
    }
}
