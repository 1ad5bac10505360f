//! oc-ai configuration, loadable from TOML with environment overrides.
//!
//! Search order: an explicit `--config` path, then
//! `<user config dir>/oc-ai/config.toml`, then `./config.toml`. No file at
//! all means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SessionError, SessionResult};
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::inference::GeneratorConfig;

/// Top-level configuration for the oc-ai client.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// API key for the generator service.
    #[serde(default)]
    pub openai_key: Option<String>,
    /// Model used when `--ai-model` is not given.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Base URL of the chat-completions API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Ask before running commands at or above the confirmation threshold.
    #[serde(default = "default_confirm_execute")]
    pub confirm_execute: bool,
    /// Entries kept in the history file (0 keeps everything).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,
    #[serde(default = "default_context_refresh")]
    pub context_refresh_secs: u64,
    /// kubeconfig passed to the cluster CLI. Unset leaves the CLI's own default.
    #[serde(default)]
    pub kubeconfig: Option<String>,
}

fn default_model() -> String {
    "gpt-4-turbo".into()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".into()
}

fn default_confirm_execute() -> bool {
    true
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_generation_timeout() -> u64 {
    15
}

fn default_execution_timeout() -> u64 {
    30
}

fn default_context_refresh() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            openai_key: None,
            default_model: default_model(),
            api_base: default_api_base(),
            confirm_execute: default_confirm_execute(),
            history_limit: default_history_limit(),
            generation_timeout_secs: default_generation_timeout(),
            execution_timeout_secs: default_execution_timeout(),
            context_refresh_secs: default_context_refresh(),
            kubeconfig: None,
        }
    }
}

impl AgentConfig {
    /// Load config from a TOML file path.
    pub fn from_file(path: &Path) -> SessionResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SessionError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents).map_err(|e| {
            SessionError::Configuration(format!("error reading config {}: {e}", path.display()))
        })
    }

    /// Resolve the config file, parse it, and apply environment overrides.
    ///
    /// `env` looks up a variable by name; `main` passes `std::env::var(..).ok()`.
    pub fn load(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> SessionResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::search_paths().into_iter().find(|p| p.is_file()) {
                Some(path) => {
                    tracing::debug!(path = %path.display(), "loading config");
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the session cannot run with.
    pub fn validate(&self) -> SessionResult<()> {
        let durations = [
            ("generation_timeout_secs", self.generation_timeout_secs),
            ("execution_timeout_secs", self.execution_timeout_secs),
            ("context_refresh_secs", self.context_refresh_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(SessionError::Configuration(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Candidate config files, in priority order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("oc-ai").join("config.toml"));
        }
        paths.push(PathBuf::from("config.toml"));
        paths
    }

    /// Apply `OC_AI_*` overrides, then `OPENAI_API_KEY` if no key is set yet.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OC_AI_OPENAI_KEY") {
            self.openai_key = Some(key);
        }
        if let Some(model) = non_empty("OC_AI_DEFAULT_MODEL") {
            self.default_model = model;
        }
        if let Some(base) = non_empty("OC_AI_API_BASE") {
            self.api_base = base;
        }
        if self.openai_key.as_deref().is_none_or(str::is_empty) {
            self.openai_key = non_empty("OPENAI_API_KEY");
        }
    }

    /// Connection settings for the generator. Fails when no API key is set.
    pub fn generator_config(&self, model_override: Option<&str>) -> SessionResult<GeneratorConfig> {
        let api_key = self
            .openai_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                SessionError::Configuration(
                    "OpenAI API key not set (config `openai_key`, OC_AI_OPENAI_KEY or OPENAI_API_KEY)"
                        .into(),
                )
            })?;

        Ok(GeneratorConfig {
            api_base: self.api_base.clone(),
            api_key,
            model: model_override.unwrap_or(&self.default_model).to_string(),
            // The pipeline enforces the generation timeout; the HTTP client
            // only guards against a connection that never completes.
            timeout: self.generation_timeout() * 2,
        })
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    pub fn context_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.context_refresh_secs)
    }

    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        self.kubeconfig.as_ref().map(PathBuf::from)
    }
}
