//! Analysis orchestration
//!
//! Opens one engine session per run, issues the planned operations
//! concurrently, and collects an outcome for every operation. A failing
//! operation never aborts its siblings; only a failure to connect at all
//! is treated as a run-level condition.

use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;

use crate::analysis::{
    AnalysisOp, AnalysisOutcome, AnalysisPlan, AnalysisReport, SKIP_ENGINE_UNAVAILABLE,
};
use crate::engine::{EngineConnector, EngineError, EngineSession};

pub struct Orchestrator<'a> {
    connector: &'a dyn EngineConnector,
    call_timeout: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(connector: &'a dyn EngineConnector, call_timeout: Duration) -> Self {
        Self {
            connector,
            call_timeout,
        }
    }

    /// Run the plan. Without a plan nothing is contacted and every
    /// operation is reported as skipped.
    pub async fn run(&self, plan: Option<&AnalysisPlan>) -> AnalysisReport {
        let Some(plan) = plan else {
            tracing::info!("No project or schematic file; skipping analysis engine");
            return AnalysisReport::skipped(None, SKIP_ENGINE_UNAVAILABLE);
        };

        let session = match self.connector.connect().await {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Analysis engine unavailable: {}", e);
                let mut report = AnalysisReport::skipped(Some(plan), SKIP_ENGINE_UNAVAILABLE);
                report.mcp_error = Some(e.to_string());
                return report;
            }
        };

        let outcomes = self.run_operations(session.as_ref(), plan).await;
        session.close().await;

        let mut report = AnalysisReport::skipped(Some(plan), SKIP_ENGINE_UNAVAILABLE);
        report.mcp_available = true;
        report.results.extend(outcomes);
        report
    }

    async fn run_operations(
        &self,
        session: &dyn EngineSession,
        plan: &AnalysisPlan,
    ) -> Vec<(AnalysisOp, AnalysisOutcome)> {
        let calls = plan.ops.iter().map(|op| async move {
            let outcome = self.run_operation(session, plan, *op).await;
            match &outcome {
                AnalysisOutcome::Ok { .. } => tracing::info!("Analysis {} completed", op),
                AnalysisOutcome::Failed { reason } => {
                    tracing::warn!("Analysis {} failed: {}", op, reason)
                }
                AnalysisOutcome::Skipped { .. } => {}
            }
            (*op, outcome)
        });
        join_all(calls).await
    }

    async fn run_operation(
        &self,
        session: &dyn EngineSession,
        plan: &AnalysisPlan,
        op: AnalysisOp,
    ) -> AnalysisOutcome {
        let tool = op.tool_name(&plan.target);
        let call = session.call_tool(tool, plan.target.arguments());
        let response = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(response) => response,
            Err(_) => Err(EngineError::Timeout(self.call_timeout)),
        };
        match response {
            Ok(text) => outcome_from_text(&text),
            Err(e) => AnalysisOutcome::failed(e.to_string()),
        }
    }
}

/// Parse a tool's text response. Non-JSON text is kept verbatim; a JSON
/// object with `success: false` is an operation failure.
pub fn outcome_from_text(text: &str) -> AnalysisOutcome {
    let data = serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.to_string()));
    if data.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = ["error", "message"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_str))
            .unwrap_or("Operation reported failure");
        return AnalysisOutcome::failed(reason);
    }
    AnalysisOutcome::ok(data)
}
