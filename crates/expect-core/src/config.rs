//! Engine configuration loaded from `expect.config.yaml`.

use crate::reporter::ReporterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE: &str = "expect.config.yaml";

/// Errors that can occur during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("max-stack-frames must be at least 1 when capture-stack is enabled")]
    ZeroStackFrames,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// Capture call stacks for errors and unlocated expectations (default: true).
    #[serde(default = "default_capture_stack")]
    pub capture_stack: bool,

    /// Upper bound on frames kept in an error record (default: 64).
    #[serde(default = "default_max_stack_frames")]
    pub max_stack_frames: usize,

    /// Settings for the bundled console reporter.
    #[serde(default)]
    pub reporter: ReporterConfig,
}

const fn default_capture_stack() -> bool {
    true
}

const fn default_max_stack_frames() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            capture_stack: default_capture_stack(),
            max_stack_frames: default_max_stack_frames(),
            reporter: ReporterConfig::default(),
        }
    }
}

/// Load engine configuration from `dir/expect.config.yaml`.
///
/// If the file doesn't exist, returns default configuration.
///
/// # Errors
/// Returns an error if:
/// - The file exists but cannot be read
/// - The YAML is invalid
/// - `max-stack-frames` is 0 while stack capture is on
pub fn load_config(dir: &Path) -> Result<EngineConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);

    let config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        serde_yml::from_str(&content)?
    } else {
        EngineConfig::default()
    };

    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration.
///
/// # Errors
/// Returns `ConfigError::ZeroStackFrames` if stacks would be captured but
/// none could be kept.
pub const fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.capture_stack && config.max_stack_frames == 0 {
        return Err(ConfigError::ZeroStackFrames);
    }
    Ok(())
}

/// Caller-supplied overrides, e.g. from command-line flags.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub capture_stack: Option<bool>,
    pub max_stack_frames: Option<usize>,
    pub verbose: Option<bool>,
    pub color: Option<bool>,
}

/// Apply overrides to a configuration.
#[must_use]
pub fn apply_overrides(mut config: EngineConfig, overrides: &ConfigOverrides) -> EngineConfig {
    if let Some(capture_stack) = overrides.capture_stack {
        config.capture_stack = capture_stack;
    }
    if let Some(max_stack_frames) = overrides.max_stack_frames {
        config.max_stack_frames = max_stack_frames;
    }
    if let Some(verbose) = overrides.verbose {
        config.reporter.verbose = verbose;
    }
    if let Some(color) = overrides.color {
        config.reporter.color = color;
    }
    config
}
