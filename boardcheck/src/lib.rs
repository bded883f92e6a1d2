//! BoardCheck - KiCad design validation pipeline
//!
//! Takes a set of uploaded KiCad files, runs design checks through an
//! external analysis engine (the KiCad MCP server), classifies every
//! component, derives a phased firmware bring-up plan and writes a
//! validation report plus supporting artifacts.
//!
//! # Quick Start
//!
//! ```no_run
//! use boardcheck::{Config, Pipeline, UploadedFile};
//! use std::path::Path;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let pipeline = Pipeline::new(Config::default());
//! let files = vec![UploadedFile::from_path(Path::new("demo.kicad_pro"))?];
//! let result = pipeline.run(None, &files).await?;
//!
//! println!("{}: {}", result.validation_id, result.summary.status);
//! for note in &result.summary.notes {
//!     println!("  {}", note);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modes
//!
//! - **Analysis** ([`Pipeline::run`]): DRC, board boundaries, netlist,
//!   circuit patterns and BOM from the analysis engine
//! - **Planning** ([`Pipeline::run_planning`]): raw file text handed to a
//!   planning agent that answers with a firmware plan and PRD summary

pub mod analysis;
pub mod artifacts;
pub mod config;
pub mod core;
pub mod engine;
pub mod files;
pub mod firmware;
pub mod planner;
pub mod report;
pub mod summary;

// Re-export main types
pub use crate::core::{
    generate_validation_id, load_config, resolve_validation_id, to_response, BoardCheckError,
    Pipeline, PipelineResult, PlanningResult, PlanningSummary,
};
pub use analysis::{AnalysisOp, AnalysisOutcome, AnalysisReport};
pub use artifacts::{ArtifactKind, ArtifactStore};
pub use config::Config;
pub use engine::{EngineConnector, EngineError, EngineSession, StdioEngine};
pub use files::{DesignFiles, UploadedFile};
pub use firmware::{ComponentCategory, ComponentDescription, FirmwarePlan};
pub use planner::{AgentPlanner, PlannerError, PlanningEngine, PrdSummary};
pub use summary::{ValidationStatus, ValidationSummary};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardCheckError, Config, Pipeline, PipelineResult, UploadedFile, ValidationStatus,
        ValidationSummary,
    };
}
