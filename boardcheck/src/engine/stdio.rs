//! Child-process transport for the KiCad MCP server.
//!
//! The server is spawned per run and driven through an `rmcp` client
//! service. Tool calls go through a cloned [`Peer`], which multiplexes
//! concurrent requests over the one stdio connection.

use async_trait::async_trait;
use rmcp::model::CallToolRequestParam;
use rmcp::service::{Peer, RunningService, ServiceError};
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::engine::{EngineConnector, EngineError, EngineSession};

const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Launches the analysis engine as a subprocess for each run.
pub struct StdioEngine {
    config: EngineConfig,
}

impl StdioEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineConnector for StdioEngine {
    async fn connect(&self) -> Result<Box<dyn EngineSession>, EngineError> {
        tracing::debug!(
            "Spawning analysis engine: {} {}",
            self.config.command,
            self.config.server_path.display()
        );

        let mut command = Command::new(&self.config.command);
        command.arg(&self.config.server_path).kill_on_drop(true);
        let (transport, _stderr) = TokioChildProcess::builder(command)
            .stderr(Stdio::inherit())
            .spawn()?;

        // Dropping the handshake future drops the transport, which kills the child.
        let timeout = self.config.connect_timeout();
        let service = match tokio::time::timeout(timeout, ().serve(transport)).await {
            Ok(Ok(service)) => service,
            Ok(Err(e)) => return Err(EngineError::Handshake(e.to_string())),
            Err(_) => return Err(EngineError::Timeout(timeout)),
        };
        tracing::debug!("Analysis engine handshake complete");

        Ok(Box::new(StdioSession {
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            call_timeout: self.config.call_timeout(),
        }))
    }
}

/// One live connection. Each call carries its own deadline.
pub struct StdioSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    call_timeout: Duration,
}

fn engine_error(error: ServiceError) -> EngineError {
    match error {
        ServiceError::McpError(data) => EngineError::Protocol(data.message.to_string()),
        ServiceError::TransportClosed => EngineError::Closed,
        other => EngineError::Protocol(other.to_string()),
    }
}

/// Join the `text` items of a tool result's content list.
pub fn tool_text_content(result: &Value) -> String {
    result
        .get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[async_trait]
impl EngineSession for StdioSession {
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, EngineError> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(EngineError::Protocol(format!(
                    "tool arguments must be an object, got {}",
                    other
                )))
            }
        };
        let request = CallToolRequestParam {
            name: name.to_string().into(),
            arguments,
        };

        let result = tokio::time::timeout(self.call_timeout, self.peer.call_tool(request))
            .await
            .map_err(|_| EngineError::Timeout(self.call_timeout))?
            .map_err(engine_error)?;
        let result =
            serde_json::to_value(&result).map_err(|e| EngineError::Protocol(e.to_string()))?;

        let text = tool_text_content(&result);
        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            return Err(EngineError::Tool(if text.is_empty() {
                format!("{} reported an error", name)
            } else {
                text
            }));
        }
        Ok(text)
    }

    async fn close(&self) {
        let Some(service) = self.service.lock().await.take() else {
            return;
        };
        match tokio::time::timeout(CLOSE_GRACE, service.cancel()).await {
            Ok(Ok(reason)) => tracing::debug!("Analysis engine session closed: {:?}", reason),
            Ok(Err(e)) => tracing::warn!("Analysis engine session task failed: {}", e),
            Err(_) => tracing::warn!("Analysis engine did not shut down within {:?}", CLOSE_GRACE),
        }
    }
}
