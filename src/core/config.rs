use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::core::errors::{PartError, Result};

/// Per-part settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartConfig {
    /// Human readable name, used in logs and errors
    pub name: String,
    /// Drop input envelopes whose token differs from the part's token
    pub token_check: bool,
}

impl Default for PartConfig {
    fn default() -> Self {
        Self {
            name: format!("part_{}", Uuid::new_v4().simple()),
            token_check: true,
        }
    }
}

impl PartConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_token_check(mut self, enabled: bool) -> Self {
        self.token_check = enabled;
        self
    }
}

/// Settings for a [`LocalRuntime`](crate::runtime::LocalRuntime)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime name/identifier
    pub name: String,
    /// Number of deliveries a mailbox buffers before sends are refused
    pub mailbox_capacity: usize,
    /// Part settings keyed by part name
    pub parts: HashMap<String, PartConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: format!("runtime_{}", Uuid::new_v4().simple()),
            mailbox_capacity: 1024,
            parts: HashMap::new(),
        }
    }
}

impl RuntimeConfig {
    /// Create a new builder for RuntimeConfig
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::new()
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(PartError::configuration_field(
                "mailbox_capacity must be greater than 0",
                "mailbox_capacity",
            ));
        }
        for (key, part) in &self.parts {
            if part.name.is_empty() {
                return Err(PartError::configuration_field(
                    format!("part '{}' has an empty name", key),
                    "parts.name",
                ));
            }
        }
        Ok(())
    }

    /// Settings for the named part, falling back to defaults carrying that name
    pub fn part(&self, name: &str) -> PartConfig {
        self.parts
            .get(name)
            .cloned()
            .unwrap_or_else(|| PartConfig::named(name))
    }

    /// Small mailboxes, handy for exercising backpressure in tests
    pub fn development() -> Self {
        Self {
            mailbox_capacity: 64,
            ..Default::default()
        }
    }
}

/// Builder for RuntimeConfig
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set mailbox capacity
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.mailbox_capacity = capacity;
        self
    }

    /// Add settings for a part, keyed by its name
    pub fn part(mut self, part: PartConfig) -> Self {
        self.config.parts.insert(part.name.clone(), part);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<RuntimeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for RuntimeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
