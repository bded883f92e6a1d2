//! Analysis engine client interface
//!
//! The analysis engine is an external tool server (the KiCad MCP server)
//! that answers named tool calls with free-form text. A connection is
//! acquired once per validation run through an [`EngineConnector`] and
//! released before the pipeline moves on to synthesis.

pub mod stdio;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub use stdio::StdioEngine;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to start analysis engine: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("Analysis engine handshake failed: {0}")]
    Handshake(String),
    #[error("Analysis engine call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Analysis engine protocol error: {0}")]
    Protocol(String),
    #[error("{0}")]
    Tool(String),
    #[error("Analysis engine connection closed")]
    Closed,
}

/// An open connection to the analysis engine.
///
/// Calls on one session may be issued concurrently.
#[async_trait]
pub trait EngineSession: Send + Sync {
    /// Invoke a named tool and return its text content.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, EngineError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&self);
}

/// Acquires engine sessions. One session is opened per validation run.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn EngineSession>, EngineError>;
}
