//! Runtime configuration.
//!
//! Settings come from an optional TOML file, then environment variables
//! override individual fields. Every field has a default so an empty file
//! (or no file at all) is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Analysis engine (KiCad MCP server) launch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_python")]
    pub command: String,
    #[serde(default = "default_server_path")]
    pub server_path: PathBuf,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Planning engine (firmware planning agent) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_python")]
    pub command: String,
    #[serde(default = "default_agent_script")]
    pub script_path: PathBuf,
    #[serde(default = "default_planner_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_file_chars")]
    pub max_file_chars: usize,
    #[serde(default = "default_max_total_chars")]
    pub max_total_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_python() -> String {
    "python3".to_string()
}
fn default_server_path() -> PathBuf {
    PathBuf::from("main.py")
}
fn default_call_timeout() -> u64 {
    30
}
fn default_connect_timeout() -> u64 {
    30
}
fn default_agent_script() -> PathBuf {
    PathBuf::from("agent/llamaindex_agent.py")
}
fn default_planner_timeout() -> u64 {
    45
}
fn default_max_file_chars() -> usize {
    120_000
}
fn default_max_total_chars() -> usize {
    400_000
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("generated")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_python(),
            server_path: default_server_path(),
            call_timeout_secs: default_call_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            command: default_python(),
            script_path: default_agent_script(),
            timeout_secs: default_planner_timeout(),
            max_file_chars: default_max_file_chars(),
            max_total_chars: default_max_total_chars(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl EngineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl PlannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from a TOML file, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml(&content)?
            }
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config file")
    }

    /// Override fields from environment-style lookups. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("KICAD_MCP_PYTHON") {
            self.engine.command = v;
        }
        if let Some(v) = get("KICAD_MCP_SERVER_PATH") {
            self.engine.server_path = PathBuf::from(v);
        }
        if let Some(v) = get("LLAMA_AGENT_PYTHON").or_else(|| get("PYTHON")) {
            self.planner.command = v;
        }
        if let Some(v) = get("LLAMA_AGENT_SCRIPT") {
            self.planner.script_path = PathBuf::from(v);
        }
        if let Some(ms) = get("LLAMA_AGENT_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            // Sub-second values round up so the timeout never becomes zero.
            self.planner.timeout_secs = ms.div_ceil(1000);
        }
        if let Some(n) = get("LLM_MAX_FILE_CHARS").and_then(|v| v.parse::<usize>().ok()) {
            self.planner.max_file_chars = n;
        }
        if let Some(n) = get("LLM_MAX_TOTAL_CHARS").and_then(|v| v.parse::<usize>().ok()) {
            self.planner.max_total_chars = n;
        }
        if let Some(v) = get("BOARDCHECK_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.call_timeout_secs == 0 {
            anyhow::bail!("engine.call_timeout_secs must be > 0");
        }
        if self.engine.connect_timeout_secs == 0 {
            anyhow::bail!("engine.connect_timeout_secs must be > 0");
        }
        if self.planner.timeout_secs == 0 {
            anyhow::bail!("planner.timeout_secs must be > 0");
        }
        if self.planner.max_file_chars == 0 || self.planner.max_total_chars == 0 {
            anyhow::bail!("planner char limits must be > 0");
        }
        Ok(())
    }
}
