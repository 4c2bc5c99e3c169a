use crate::constants::{
    DEFAULT_ACADEMIC_YEAR, DEFAULT_SCHEMA_VERSION, DEFAULT_TIMEOUT_SECONDS, DEFAULT_USER_AGENT,
};
use crate::error::{Result, ScraperError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

static ACADEMIC_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{4}$").unwrap());

/// What the pipeline does when a record fails normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log a warning, report the record and continue with the next one
    #[default]
    Skip,
    /// Stop the run at the first invalid record
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(FailurePolicy::Skip),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(ScraperError::Config(format!(
                "Unknown failure policy '{other}' (expected 'skip' or 'abort')"
            ))),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Skip => write!(f, "skip"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub academic_year: String,
    pub schema_version: String,
    pub failure_policy: FailurePolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            academic_year: DEFAULT_ACADEMIC_YEAR.to_string(),
            schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run: RunConfig,
    pub http: HttpConfig,
}

impl Config {
    /// Load `config.toml` from the working directory, then apply env overrides.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_file("config.toml")?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a TOML file. A missing file yields the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(year) = lookup("COURSE_ACADEMIC_YEAR").filter(|v| !v.trim().is_empty()) {
            self.run.academic_year = year.trim().to_string();
        }
        if let Some(version) = lookup("COURSE_SCHEMA_VERSION").filter(|v| !v.trim().is_empty()) {
            self.run.schema_version = version.trim().to_string();
        }
        if let Some(policy) = lookup("COURSE_FAILURE_POLICY").filter(|v| !v.trim().is_empty()) {
            self.run.failure_policy = policy.parse()?;
        }
        self.validate()
    }

    /// Run metadata is stamped on every record, so it must satisfy the
    /// record schema: `YYYY-YYYY` academic year, non-empty schema version.
    pub fn validate(&self) -> Result<()> {
        if !ACADEMIC_YEAR.is_match(&self.run.academic_year) {
            return Err(ScraperError::Config(format!(
                "Invalid academic year '{}' (expected YYYY-YYYY)",
                self.run.academic_year
            )));
        }
        if self.run.schema_version.trim().is_empty() {
            return Err(ScraperError::Config("Schema version must not be empty".into()));
        }
        Ok(())
    }
}
