//! Uploaded design files and their roles.
//!
//! A validation run starts from an ordered set of uploaded files. Only three
//! extensions carry a role (project, board, schematic); everything else is
//! passed along as auxiliary input.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One uploaded file as handed over by the upload boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Name the user uploaded the file under (drives role detection)
    pub original_name: String,
    /// Where the file is stored on disk
    pub storage_path: PathBuf,
    pub size_bytes: u64,
}

impl UploadedFile {
    pub fn new(
        original_name: impl Into<String>,
        storage_path: impl Into<PathBuf>,
        size_bytes: u64,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            storage_path: storage_path.into(),
            size_bytes,
        }
    }

    /// Describe a file already on disk, using its file name as the upload name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let original_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self::new(original_name, path, metadata.len()))
    }

    /// Lower-cased extension including the leading dot, or "" when absent.
    pub fn extension(&self) -> String {
        file_ext(&self.original_name)
    }

    pub fn role(&self) -> Option<FileRole> {
        FileRole::from_name(&self.original_name)
    }
}

/// Lower-cased extension of a file name including the dot (`.kicad_sch`).
pub fn file_ext(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Role a design file plays in a KiCad project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Project,
    Board,
    Schematic,
}

impl FileRole {
    pub fn from_name(name: &str) -> Option<Self> {
        match file_ext(name).as_str() {
            ".kicad_pro" => Some(FileRole::Project),
            ".kicad_pcb" => Some(FileRole::Board),
            ".kicad_sch" => Some(FileRole::Schematic),
            _ => None,
        }
    }
}

/// Uploaded files sorted into roles. The first file of each role wins.
#[derive(Debug, Clone, Default)]
pub struct DesignFiles {
    pub project: Option<UploadedFile>,
    pub board: Option<UploadedFile>,
    pub schematic: Option<UploadedFile>,
    pub all: Vec<UploadedFile>,
}

impl DesignFiles {
    pub fn classify(files: &[UploadedFile]) -> Self {
        let mut design = DesignFiles {
            all: files.to_vec(),
            ..Default::default()
        };
        for file in files {
            let slot = match file.role() {
                Some(FileRole::Project) => &mut design.project,
                Some(FileRole::Board) => &mut design.board,
                Some(FileRole::Schematic) => &mut design.schematic,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(file.clone());
            }
        }
        design
    }

    /// True when at least one of project/board/schematic was uploaded.
    pub fn has_design_file(&self) -> bool {
        self.project.is_some() || self.board.is_some() || self.schematic.is_some()
    }

    /// Project name taken from the `.kicad_pro` file stem.
    pub fn project_name(&self) -> Option<String> {
        self.project.as_ref().and_then(|p| {
            Path::new(&p.original_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string())
        })
    }

    pub fn total_bytes(&self) -> u64 {
        self.all.iter().map(|f| f.size_bytes).sum()
    }

    pub fn project_info(&self) -> ProjectInfo {
        ProjectInfo {
            name: self.project_name(),
            project_path: self.project.as_ref().map(|f| f.storage_path.clone()),
            pcb_path: self.board.as_ref().map(|f| f.storage_path.clone()),
            schematic_path: self.schematic.as_ref().map(|f| f.storage_path.clone()),
            files: self.all.clone(),
        }
    }
}

/// Project block returned to the caller alongside the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: Option<String>,
    pub project_path: Option<PathBuf>,
    pub pcb_path: Option<PathBuf>,
    pub schematic_path: Option<PathBuf>,
    pub files: Vec<UploadedFile>,
}
