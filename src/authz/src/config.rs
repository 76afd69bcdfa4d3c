//! Configuration loading and validation

use crate::engine::{AuditConfig, EngineConfig, OverflowPolicy};
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct WardenConfig {
    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub audit: AuditSection,

    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub seed: SeedSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSection {
    /// Deadline for one decision; 0 disables the timeout
    #[serde(default = "default_decision_timeout")]
    pub decision_timeout_ms: u64,
    #[serde(default)]
    pub inherit_resource_grants: bool,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    /// Latency samples kept for percentiles
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AuditSection {
    #[serde(default = "default_audit_capacity")]
    pub capacity: usize,
    #[serde(default = "default_audit_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingSection {
    /// Default `tracing` filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SeedSection {
    /// Seed document applied at startup
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// Default value functions
fn default_true() -> bool { true }
fn default_decision_timeout() -> u64 { 1000 }
fn default_latency_window() -> usize { 10_000 }
fn default_audit_capacity() -> usize { 10_000 }
fn default_audit_batch_size() -> usize { 256 }
fn default_log_level() -> String { "info".to_string() }

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            decision_timeout_ms: default_decision_timeout(),
            inherit_resource_grants: false,
            enable_metrics: default_true(),
            latency_window: default_latency_window(),
        }
    }
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            capacity: default_audit_capacity(),
            batch_size: default_audit_batch_size(),
            overflow: OverflowPolicy::default(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("failed to parse configuration: {}", e)))
    }

    /// Apply `WARDEN_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("WARDEN_DECISION_TIMEOUT_MS") {
            self.engine.decision_timeout_ms = value.trim().parse().map_err(|_| {
                AuthzError::Config(format!("WARDEN_DECISION_TIMEOUT_MS is not a number: '{}'", value))
            })?;
        }

        if let Some(value) = lookup("WARDEN_AUDIT_CAPACITY") {
            self.audit.capacity = value.trim().parse().map_err(|_| {
                AuthzError::Config(format!("WARDEN_AUDIT_CAPACITY is not a number: '{}'", value))
            })?;
        }

        if let Some(value) = lookup("WARDEN_AUDIT_OVERFLOW") {
            self.audit.overflow = value.parse()?;
        }

        if let Some(value) = lookup("WARDEN_LOG") {
            self.logging.level = value;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audit.capacity == 0 {
            return Err(AuthzError::Config("audit.capacity must be greater than 0".to_string()));
        }

        if self.audit.batch_size == 0 {
            return Err(AuthzError::Config("audit.batch_size must be greater than 0".to_string()));
        }

        if self.engine.latency_window == 0 {
            return Err(AuthzError::Config("engine.latency_window must be greater than 0".to_string()));
        }

        if self.logging.level.trim().is_empty() {
            return Err(AuthzError::Config("logging.level cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Resolver settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            decision_timeout: (self.engine.decision_timeout_ms > 0)
                .then(|| Duration::from_millis(self.engine.decision_timeout_ms)),
            inherit_resource_grants: self.engine.inherit_resource_grants,
            enable_metrics: self.engine.enable_metrics,
            latency_window: self.engine.latency_window,
        }
    }

    /// Audit recorder settings
    pub fn audit_config(&self) -> AuditConfig {
        AuditConfig {
            capacity: self.audit.capacity,
            batch_size: self.audit.batch_size,
            overflow: self.audit.overflow,
        }
    }
}
