use crate::agent::chat_completions::DEFAULT_CHAT_COMPLETIONS_URL;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::session::DEFAULT_MAX_ITERATIONS;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_REPOSITORY: &str = "JetBrains/compose-multiplatform";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_FORMAT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_CODE_SEARCH_URL: &str = "http://localhost:8080/search";
pub const DEFAULT_YOUTRACK_URL: &str = "https://youtrack.jetbrains.com";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got '{value}'")]
    InvalidNumber { key: String, value: String },
}

/// Runtime configuration. Credentials may be blank here; each adapter
/// checks its own token when it is first used.
#[derive(Debug, Clone)]
pub struct Config {
    pub model_token: String,
    pub model: String,
    pub model_url: String,
    pub code_search_token: String,
    pub code_search_url: String,
    pub github_token: String,
    pub youtrack_token: String,
    pub youtrack_url: String,
    pub repository: String,
    pub branch: String,
    pub max_iterations: usize,
    pub format_max_iterations: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_token: String::new(),
            model: DEFAULT_MODEL.to_string(),
            model_url: DEFAULT_CHAT_COMPLETIONS_URL.to_string(),
            code_search_token: String::new(),
            code_search_url: DEFAULT_CODE_SEARCH_URL.to_string(),
            github_token: String::new(),
            youtrack_token: String::new(),
            youtrack_url: DEFAULT_YOUTRACK_URL.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            format_max_iterations: DEFAULT_FORMAT_MAX_ITERATIONS,
            model_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(30),
            event_buffer: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Config {
    /// Load from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                None => Ok(default),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(ConfigError::InvalidNumber {
                        key: key.to_string(),
                        value: raw,
                    }),
                },
            }
        };

        Ok(Self {
            model_token: text("DISPATCH_MODEL_TOKEN", ""),
            model: text("DISPATCH_MODEL", &defaults.model),
            model_url: text("DISPATCH_MODEL_URL", &defaults.model_url),
            code_search_token: text("CODE_SEARCH_TOKEN", ""),
            code_search_url: text("CODE_SEARCH_URL", &defaults.code_search_url),
            github_token: text("GITHUB_TOKEN", ""),
            youtrack_token: text("YOUTRACK_TOKEN", ""),
            youtrack_url: text("YOUTRACK_URL", &defaults.youtrack_url),
            repository: text("DISPATCH_REPOSITORY", &defaults.repository),
            branch: text("DISPATCH_BRANCH", &defaults.branch),
            max_iterations: number("DISPATCH_MAX_ITERATIONS", defaults.max_iterations as u64)? as usize,
            format_max_iterations: number("DISPATCH_FORMAT_MAX_ITERATIONS", defaults.format_max_iterations as u64)?
                as usize,
            model_timeout: Duration::from_secs(number("DISPATCH_MODEL_TIMEOUT_SECS", defaults.model_timeout.as_secs())?),
            tool_timeout: Duration::from_secs(number("DISPATCH_TOOL_TIMEOUT_SECS", defaults.tool_timeout.as_secs())?),
            event_buffer: number("DISPATCH_EVENT_BUFFER", defaults.event_buffer as u64)? as usize,
        })
    }
}
