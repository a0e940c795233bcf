//! Runtime options (basis.toml)
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! initial_capacity = 256
//! max_objects = 100000
//! trap_args = "receiver-only"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::defaults::DEFAULT_INITIAL_CAPACITY;

/// Errors that can occur while loading options
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read options file
    #[error("Failed to read options file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid options: {0}")]
    Validation(String),
}

/// How `trap` treats arguments beyond the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrapArgPolicy {
    /// Forward extra arguments positionally after the receiver
    #[default]
    Forward,
    /// Call with the receiver only; a non-empty bundle is an argument mismatch
    ReceiverOnly,
}

/// Options for creating a `RuntimeEnv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Arena slots reserved up front
    pub initial_capacity: usize,

    /// Maximum number of live objects (None = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_objects: Option<usize>,

    /// Extra-argument handling for `trap`
    pub trap_args: TrapArgPolicy,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_objects: None,
            trap_args: TrapArgPolicy::Forward,
        }
    }
}

impl RuntimeOptions {
    /// Options with a live-object limit
    pub fn with_object_limit(max_objects: usize) -> Self {
        Self {
            max_objects: Some(max_objects),
            initial_capacity: DEFAULT_INITIAL_CAPACITY.min(max_objects),
            ..Default::default()
        }
    }

    /// Options with a specific trap argument policy
    pub fn with_trap_args(trap_args: TrapArgPolicy) -> Self {
        Self {
            trap_args,
            ..Default::default()
        }
    }

    /// Load options from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse options from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let options: RuntimeOptions = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max) = self.max_objects {
            if max == 0 {
                return Err(ConfigError::Validation(
                    "max_objects must be greater than zero".to_string(),
                ));
            }
            if self.initial_capacity > max {
                return Err(ConfigError::Validation(format!(
                    "initial_capacity ({}) exceeds max_objects ({})",
                    self.initial_capacity, max
                )));
            }
        }
        Ok(())
    }
}
