//! Agent configuration stored in `agent.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::files::DEFAULT_READ_LIMIT_CHARS;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_SCRIPT_TIMEOUT, ScriptPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "agent.toml";

/// Agent configuration (TOML).
///
/// Missing fields default to the reference values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory all tool paths are confined to, relative to the process cwd.
    pub working_root: PathBuf,

    /// Maximum number of actions dispatched before the loop gives up.
    pub max_iterations: u32,

    pub tools: ToolsConfig,

    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolsConfig {
    /// `read_file` returns at most this many characters.
    pub read_limit_chars: usize,

    /// Wall-clock budget for `run_script`, in seconds.
    pub script_timeout_secs: u64,

    /// Truncate script stdout/stderr beyond this many bytes.
    pub script_output_limit_bytes: usize,

    pub interpreter: String,

    /// Scripts must carry this extension (no leading dot).
    pub script_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            working_root: PathBuf::from("calculator"),
            max_iterations: 20,
            tools: ToolsConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            read_limit_chars: DEFAULT_READ_LIMIT_CHARS,
            script_timeout_secs: DEFAULT_SCRIPT_TIMEOUT.as_secs(),
            script_output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            interpreter: "python3".to_string(),
            script_extension: "py".to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.0-flash-001".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.working_root.as_os_str().is_empty() {
            return Err(anyhow!("working_root must not be empty"));
        }
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if self.tools.read_limit_chars == 0 {
            return Err(anyhow!("tools.read_limit_chars must be > 0"));
        }
        if self.tools.script_timeout_secs == 0 {
            return Err(anyhow!("tools.script_timeout_secs must be > 0"));
        }
        if self.tools.script_output_limit_bytes == 0 {
            return Err(anyhow!("tools.script_output_limit_bytes must be > 0"));
        }
        if self.tools.interpreter.trim().is_empty() {
            return Err(anyhow!("tools.interpreter must not be empty"));
        }
        if self.tools.script_extension.trim().trim_start_matches('.').is_empty() {
            return Err(anyhow!("tools.script_extension must not be empty"));
        }
        if self.model.request_timeout_secs == 0 {
            return Err(anyhow!("model.request_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn script_policy(&self) -> ScriptPolicy {
        ScriptPolicy {
            interpreter: self.tools.interpreter.clone(),
            extension: self
                .tools
                .script_extension
                .trim_start_matches('.')
                .to_string(),
            timeout: Duration::from_secs(self.tools.script_timeout_secs),
            output_limit_bytes: self.tools.script_output_limit_bytes,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
