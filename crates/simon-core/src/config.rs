use crate::error::{Result, SimonError};
use crate::paths;
use crate::types::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Where completions come from. The API key itself is never stored; only the
/// name of the environment variable holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_timeout_secs() -> u64 {
    180
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// StepOverride / StepSettings
// ---------------------------------------------------------------------------

/// Per-step overrides under `steps.<kind>` in config.yaml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Fully resolved sampling settings for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// The plan gets a larger budget than the derived tables.
pub fn default_max_tokens(kind: ArtifactKind) -> u32 {
    match kind {
        ArtifactKind::Plan => 2500,
        _ => 2000,
    }
}

// ---------------------------------------------------------------------------
// UseCaseConfig / ServerConfig / ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseCaseConfig {
    /// Ask the model to convert the use case table to JSON when the local
    /// markdown parser finds no rows.
    #[serde(default = "default_true")]
    pub model_fallback: bool,
}

fn default_true() -> bool {
    true
}

impl Default for UseCaseConfig {
    fn default() -> Self {
        Self {
            model_fallback: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_port() -> u16 {
    3141
}

fn default_max_upload_mb() -> usize {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub steps: BTreeMap<ArtifactKind, StepOverride>,
    #[serde(default)]
    pub use_cases: UseCaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            llm: LlmConfig::default(),
            steps: BTreeMap::new(),
            use_cases: UseCaseConfig::default(),
            server: ServerConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SimonError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load config.yaml, or fall back to defaults named after the root
    /// directory when the project was never initialized.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        match Self::load(root) {
            Err(SimonError::NotInitialized) => {
                let name = root
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("simon")
                    .to_string();
                Ok(Self::new(name))
            }
            other => other,
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Resolve model, temperature, and token budget for a step.
    pub fn step_settings(&self, kind: ArtifactKind) -> StepSettings {
        let ov = self.steps.get(&kind);
        StepSettings {
            model: ov
                .and_then(|o| o.model.clone())
                .unwrap_or_else(|| self.llm.model.clone()),
            temperature: ov
                .and_then(|o| o.temperature)
                .unwrap_or(self.llm.temperature),
            max_tokens: ov
                .and_then(|o| o.max_tokens)
                .unwrap_or_else(|| default_max_tokens(kind)),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if !self.llm.base_url.starts_with("http://") && !self.llm.base_url.starts_with("https://")
        {
            error(format!(
                "llm.base_url '{}' must start with http:// or https://",
                self.llm.base_url
            ));
        }
        if self.llm.api_key_env.trim().is_empty() {
            error("llm.api_key_env is empty".to_string());
        }
        if self.llm.model.trim().is_empty() {
            error("llm.model is empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            error(format!(
                "llm.temperature {} is outside 0.0..=2.0",
                self.llm.temperature
            ));
        }
        if self.llm.timeout_secs == 0 {
            error("llm.timeout_secs must be greater than 0".to_string());
        }

        for (kind, ov) in &self.steps {
            if let Some(t) = ov.temperature {
                if !(0.0..=2.0).contains(&t) {
                    error(format!("steps.{kind}.temperature {t} is outside 0.0..=2.0"));
                }
            }
            if ov.max_tokens == Some(0) {
                error(format!("steps.{kind}.max_tokens must be greater than 0"));
            }
            if ov.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                error(format!("steps.{kind}.model is empty"));
            }
        }

        if self.server.max_upload_mb == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.max_upload_mb is 0: every transcript upload will be rejected"
                    .to_string(),
            });
        }

        if std::env::var(&self.llm.api_key_env).is_err() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "environment variable {} is not set: generation will fail",
                    self.llm.api_key_env
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
