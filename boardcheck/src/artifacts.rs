//! Write-once artifact storage.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Artifact kinds and their file name suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Report,
    FirmwarePlan,
    Components,
    Summary,
    Prd,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Report => "_report.md",
            ArtifactKind::FirmwarePlan => "_firmware_plan.md",
            ArtifactKind::Components => "_components.md",
            ArtifactKind::Summary => "_summary.json",
            ArtifactKind::Prd => "_prd.md",
        }
    }

    pub fn file_name(&self, validation_id: &str) -> String {
        format!("{}{}", validation_id, self.suffix())
    }
}

/// File names of the artifacts written by an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactFiles {
    pub report: String,
    pub firmware_plan: String,
    pub components: String,
    pub summary: String,
}

impl ArtifactFiles {
    pub fn for_run(validation_id: &str) -> Self {
        Self {
            report: ArtifactKind::Report.file_name(validation_id),
            firmware_plan: ArtifactKind::FirmwarePlan.file_name(validation_id),
            components: ArtifactKind::Components.file_name(validation_id),
            summary: ArtifactKind::Summary.file_name(validation_id),
        }
    }
}

/// File names of the artifacts written by a planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningArtifactFiles {
    pub firmware_plan: String,
    pub prd: String,
    pub summary: String,
}

impl PlanningArtifactFiles {
    pub fn for_run(validation_id: &str) -> Self {
        Self {
            firmware_plan: ArtifactKind::FirmwarePlan.file_name(validation_id),
            prd: ArtifactKind::Prd.file_name(validation_id),
            summary: ArtifactKind::Summary.file_name(validation_id),
        }
    }
}

/// Failure to publish one artifact of a set.
#[derive(Debug, thiserror::Error)]
#[error("failed to write artifact {name}: {source}")]
pub struct ArtifactError {
    pub name: String,
    #[source]
    pub source: std::io::Error,
}

/// Owns the output directory. Artifacts are published as a set: either
/// every file of a run appears or none does, and an existing name is never
/// overwritten.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn staging_path(&self, file_name: &str) -> PathBuf {
        self.dir
            .join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
    }

    /// Write `(file name, content)` pairs. Contents are staged under hidden
    /// temporary names and hard-linked into place only once all of them are
    /// on disk; on any failure the files published so far are removed.
    pub async fn write_set(&self, artifacts: &[(&str, &str)]) -> Result<Vec<PathBuf>, ArtifactError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArtifactError {
                name: self.dir.display().to_string(),
                source,
            })?;

        let mut staged = Vec::with_capacity(artifacts.len());
        for (name, content) in artifacts {
            let temp = self.staging_path(name);
            let written = write_new(&temp, content).await;
            staged.push(temp);
            if let Err(source) = written {
                remove_all(&staged).await;
                return Err(ArtifactError {
                    name: name.to_string(),
                    source,
                });
            }
        }

        let mut published = Vec::with_capacity(artifacts.len());
        for ((name, content), temp) in artifacts.iter().zip(&staged) {
            let path = self.path_of(name);
            if let Err(source) = tokio::fs::hard_link(temp, &path).await {
                remove_all(&published).await;
                remove_all(&staged).await;
                return Err(ArtifactError {
                    name: name.to_string(),
                    source,
                });
            }
            tracing::debug!("Wrote artifact {} ({} bytes)", path.display(), content.len());
            published.push(path);
        }

        remove_all(&staged).await;
        Ok(published)
    }
}

async fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}
