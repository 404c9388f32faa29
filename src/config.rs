use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api/v1";
const DEFAULT_TOKEN_ENV: &str = "FBS_API_TOKEN";
const DEFAULT_AUTH_HEADER: &str = "x-auth-token";
const DEFAULT_AUDIT_DIR: &str = ".fbs/audit";

fn default_timeout_ms() -> u64 {
    15_000
}

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// How hard failures in one booking category affect the other two
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CascadePolicy {
    /// Issue all three requests, report every failure together
    #[default]
    AttemptAll,
    /// Run facility, equipment, session in order and stop at the first failure
    FailFast,
}

impl CascadePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "attempt-all" | "attempt_all" | "attemptall" | "all" => Some(Self::AttemptAll),
            "fail-fast" | "fail_fast" | "failfast" => Some(Self::FailFast),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttemptAll => "attempt-all",
            Self::FailFast => "fail-fast",
        }
    }
}

/// Backend connection settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token_env: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub auth_header: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn auth_header(&self) -> &str {
        self.auth_header.as_deref().unwrap_or(DEFAULT_AUTH_HEADER)
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or_else(default_timeout_ms)
    }

    /// Resolve the credential: direct value first, then the environment
    pub fn resolve_token(&self) -> Option<String> {
        if let Some(token) = &self.token {
            return Some(token.clone());
        }
        let env_var = self.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV);
        std::env::var(env_var).ok().filter(|t| !t.is_empty())
    }
}

/// Deactivation workflow settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub cascade: Option<CascadePolicy>,
    #[serde(default)]
    pub parallel: Option<bool>,
}

impl WorkflowConfig {
    pub fn cascade(&self) -> CascadePolicy {
        self.cascade.unwrap_or_default()
    }

    /// Requests run concurrently unless disabled or the policy is fail-fast
    pub fn parallel(&self) -> bool {
        self.parallel
            .unwrap_or(self.cascade() == CascadePolicy::AttemptAll)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl AuditConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_DIR))
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Config {
    /// Load configuration from default paths
    /// Priority: local (.fbs/config.local.toml) > project (.fbs/config.toml) > user (~/.fbs/config.toml)
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".fbs").join("config.toml");
            if user_config.exists() {
                config.merge(Self::load_from(&user_config)?);
            }
        }

        config.merge_project(Path::new("."))?;
        Ok(config)
    }

    /// Merge project-level and local config files found under `root`
    pub fn merge_project(&mut self, root: &Path) -> Result<()> {
        let fbs_dir = root.join(".fbs");

        let project_config = fbs_dir.join("config.toml");
        if project_config.exists() {
            self.merge(Self::load_from(&project_config)?);
        }

        // should be gitignored; usually carries the token
        let local_config = fbs_dir.join("config.local.toml");
        if local_config.exists() {
            self.merge(Self::load_from(&local_config)?);
        }

        Ok(())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes priority for every field it sets)
    pub fn merge(&mut self, other: Config) {
        let api = other.api;
        if api.base_url.is_some() {
            self.api.base_url = api.base_url;
        }
        if api.token_env.is_some() {
            self.api.token_env = api.token_env;
        }
        if api.token.is_some() {
            self.api.token = api.token;
        }
        if api.auth_header.is_some() {
            self.api.auth_header = api.auth_header;
        }
        if api.timeout_ms.is_some() {
            self.api.timeout_ms = api.timeout_ms;
        }

        if other.workflow.cascade.is_some() {
            self.workflow.cascade = other.workflow.cascade;
        }
        if other.workflow.parallel.is_some() {
            self.workflow.parallel = other.workflow.parallel;
        }

        if other.audit.enabled.is_some() {
            self.audit.enabled = other.audit.enabled;
        }
        if other.audit.dir.is_some() {
            self.audit.dir = other.audit.dir;
        }
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let base_url = self.api.base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            errors.push(ValidationError {
                field: "api.base_url".to_string(),
                message: format!("Expected an http(s) URL, got '{}'", base_url),
            });
        }

        if self.api.timeout_ms() == 0 {
            errors.push(ValidationError {
                field: "api.timeout_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.api.auth_header().trim().is_empty() {
            errors.push(ValidationError {
                field: "api.auth_header".to_string(),
                message: "Header name must not be empty".to_string(),
            });
        }

        if self.workflow.cascade() == CascadePolicy::FailFast && self.workflow.parallel == Some(true)
        {
            errors.push(ValidationError {
                field: "workflow.parallel".to_string(),
                message: "fail-fast runs categories in order and cannot be parallel".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
