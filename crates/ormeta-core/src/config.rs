//! Engine configuration (ormeta.toml)
//!
//! Selects the API profile whose defaults apply to unset descriptor
//! attributes, and tunes the few inference rules that differ between
//! deployments.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::identity::{IdentityScheme, ValueStrategy};

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Persistence API whose defaults apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiProfile {
    /// Object-database style: persistence-by-reachability cascades on
    #[default]
    Jdo,
    /// Entity style: no cascades unless declared
    Jpa,
}

/// Cascade defaults of an API profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeDefaults {
    /// Cascade persist
    pub persist: bool,
    /// Cascade update
    pub update: bool,
    /// Cascade delete
    pub delete: bool,
    /// Cascade attach
    pub attach: bool,
    /// Cascade detach
    pub detach: bool,
    /// Cascade refresh
    pub refresh: bool,
}

impl ApiProfile {
    /// Cascade defaults for this profile
    pub fn cascade_defaults(self) -> CascadeDefaults {
        match self {
            ApiProfile::Jdo => CascadeDefaults {
                persist: true,
                update: true,
                delete: false,
                attach: true,
                detach: false,
                refresh: false,
            },
            ApiProfile::Jpa => CascadeDefaults {
                persist: false,
                update: false,
                delete: false,
                attach: false,
                detach: false,
                refresh: false,
            },
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MetadataConfig {
    /// API profile
    #[serde(default)]
    pub api: ApiProfile,

    /// Whether columns allow null unless declared otherwise
    #[serde(default = "default_true")]
    pub default_nullable: bool,

    /// Whether transient members default to persistent
    #[serde(default)]
    pub persist_transient: bool,

    /// Whether final members default to persistent
    #[serde(default)]
    pub persist_final: bool,

    /// Identity scheme for classes that neither inherit nor declare one
    #[serde(default = "default_identity")]
    pub default_identity: IdentityScheme,

    /// Strategy for synthesized datastore identity descriptors
    #[serde(default = "default_identity_strategy")]
    pub default_identity_strategy: ValueStrategy,

    /// Extra type names treated as always-embedded values
    #[serde(default)]
    pub value_types: Vec<String>,

    /// Whether large objects other than char/byte arrays become serialized
    #[serde(default = "default_true")]
    pub lob_serialize: bool,
}

fn default_true() -> bool {
    true
}

fn default_identity() -> IdentityScheme {
    IdentityScheme::Datastore
}

fn default_identity_strategy() -> ValueStrategy {
    ValueStrategy::Native
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            api: ApiProfile::default(),
            default_nullable: true,
            persist_transient: false,
            persist_final: false,
            default_identity: default_identity(),
            default_identity_strategy: default_identity_strategy(),
            value_types: Vec::new(),
            lob_serialize: true,
        }
    }
}

impl MetadataConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: MetadataConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.value_types {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "value-types entries cannot be empty".to_string(),
                ));
            }
        }
        let mut sorted: Vec<&String> = self.value_types.iter().collect();
        sorted.sort();
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationError(format!(
                "value-types lists '{}' more than once",
                pair[0]
            )));
        }
        Ok(())
    }

    /// Cascade defaults of the active profile
    pub fn cascade_defaults(&self) -> CascadeDefaults {
        self.api.cascade_defaults()
    }

    /// Whether `name` is configured as an extra value type
    pub fn is_extra_value_type(&self, name: &str) -> bool {
        self.value_types.iter().any(|v| v == name)
    }
}
