//! Serializable delegate selection, so worker processes can rebuild the delegate.

use crate::{AuroraCliDelegate, InMemoryDelegate};
use aurora_types::{Capabilities, CommandDelegate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum DelegateConfigError {
    #[error("invalid delegate config: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("aurora client command must not be empty")]
    EmptyCommand,
}

/// Which delegate to build, by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelegateConfig {
    /// Aurora command-line client at `command`.
    Cli { command: String },
    /// Process-local in-memory job table.
    Memory,
}

impl DelegateConfig {
    pub fn validate(&self) -> Result<(), DelegateConfigError> {
        match self {
            DelegateConfig::Cli { command } if command.trim().is_empty() => {
                Err(DelegateConfigError::EmptyCommand)
            }
            _ => Ok(()),
        }
    }

    pub fn build(&self) -> Result<Arc<dyn CommandDelegate>, DelegateConfigError> {
        self.validate()?;
        let delegate: Arc<dyn CommandDelegate> = match self {
            DelegateConfig::Cli { command } => Arc::new(AuroraCliDelegate::new(command.clone())),
            DelegateConfig::Memory => Arc::new(InMemoryDelegate::new()),
        };
        Ok(delegate)
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::all()
    }

    /// Single-argument form handed to `worker --delegate-config`.
    pub fn to_arg(&self) -> Result<String, DelegateConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_arg(arg: &str) -> Result<Self, DelegateConfigError> {
        let config: DelegateConfig = serde_json::from_str(arg)?;
        config.validate()?;
        Ok(config)
    }
}
