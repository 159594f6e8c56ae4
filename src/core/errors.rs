use thiserror::Error;

use crate::core::hashing::{NameHash, TypeTag};

/// Unified error type for the partwire library.
///
/// Expected misses (an absent port, an absent link, an envelope for an
/// unknown input) are not represented here; those are reported through
/// `bool`, `Option` or [`DispatchOutcome`](crate::part::DispatchOutcome).
#[derive(Debug, Error)]
pub enum PartError {
    /// The runtime refused to hook (or unhook) a per-type dispatcher. The
    /// Part's registry no longer matches the runtime and the Part should be
    /// discarded and rebuilt.
    #[error("Part {part} is in an indeterminate state: {reason}")]
    Indeterminate { part: String, reason: String },

    /// Two payload kinds resolved to the same type tag.
    #[error("Type tag {tag} already bound to `{existing}`, cannot bind `{requested}`")]
    TypeConflict {
        tag: TypeTag,
        existing: &'static str,
        requested: &'static str,
    },

    /// Two different port names of one type share a name hash.
    #[error("Port name `{name}` collides with `{existing}` (hash {hash})")]
    NameCollision {
        name: String,
        existing: String,
        hash: NameHash,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// Serialization errors
    #[error("Serialization failed: {format}")]
    Serialization {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failures of the hosting runtime (spawning, shutdown)
    #[error("Runtime error: {message}")]
    Runtime { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PartError {
    /// Create an indeterminate-state error for the named part
    pub fn indeterminate<P: Into<String>, R: Into<String>>(part: P, reason: R) -> Self {
        Self::Indeterminate {
            part: part.into(),
            reason: reason.into(),
        }
    }

    pub fn type_conflict(tag: TypeTag, existing: &'static str, requested: &'static str) -> Self {
        Self::TypeConflict {
            tag,
            existing,
            requested,
        }
    }

    pub fn name_collision<N: Into<String>, E: Into<String>>(name: N, existing: E, hash: NameHash) -> Self {
        Self::NameCollision {
            name: name.into(),
            existing: existing.into(),
            hash,
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
            field: None,
        }
    }

    /// Create a configuration error naming the offending field
    pub fn configuration_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Configuration {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a serialization error
    pub fn serialization<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
        format: S,
        source: E,
    ) -> Self {
        Self::Serialization {
            format: format.into(),
            source: Box::new(source),
        }
    }

    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the Part that produced this error can keep running.
    ///
    /// An indeterminate Part must be rebuilt; everything else leaves the
    /// registry as it was before the failed call.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Indeterminate { .. } => false,
            Self::TypeConflict { .. } | Self::NameCollision { .. } | Self::Serialization { .. } => true,
            Self::Configuration { .. } => false,
            Self::Runtime { .. } | Self::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Indeterminate { .. } => "indeterminate",
            Self::TypeConflict { .. } => "type_conflict",
            Self::NameCollision { .. } => "name_collision",
            Self::Configuration { .. } => "configuration",
            Self::Serialization { .. } => "serialization",
            Self::Runtime { .. } => "runtime",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PartError>;

impl From<bincode::Error> for PartError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization("bincode", err)
    }
}

impl From<serde_json::Error> for PartError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("json", err)
    }
}

impl From<serde_yaml::Error> for PartError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization("yaml", err)
    }
}

impl From<anyhow::Error> for PartError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

/// Macro for creating errors
#[macro_export]
macro_rules! part_error {
    (indeterminate, $part:expr, $reason:expr) => {
        $crate::core::errors::PartError::indeterminate($part, $reason)
    };
    (configuration, $message:expr) => {
        $crate::core::errors::PartError::configuration($message)
    };
    (configuration, $message:expr, $field:expr) => {
        $crate::core::errors::PartError::configuration_field($message, $field)
    };
    (runtime, $message:expr) => {
        $crate::core::errors::PartError::runtime($message)
    };
    (internal, $message:expr) => {
        $crate::core::errors::PartError::internal($message)
    };
}
