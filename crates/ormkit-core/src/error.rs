//! Error types for OrmKit operations.

use std::fmt;

/// The primary error type for all OrmKit operations.
///
/// Every variant is cloneable so the session can retain the first failure of
/// a batch in its last-error slot while still returning it to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend failure, message passed through from the driver
    Provider(ProviderError),
    /// Schema synchronization failure or unsupported reconciliation
    Schema(SchemaError),
    /// Entity-level consistency failure (affected-row mismatch,
    /// cross-reference inconsistency, re-create of a tracked instance)
    Entity(EntityError),
    /// Metadata cannot be derived or is missing a required element
    Mapping(MappingError),
    /// Value-to-field conversion failure
    Type(TypeError),
    /// Configuration parse or content failure
    Config(ConfigError),
    /// Residual internal failures
    Other(String),
}

/// Classification of an [`Error`] into the coarse kinds the session and
/// callers dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend reported a failure
    Provider,
    /// Schema policy failed or reconciliation is unsupported
    UnsynchronizedSchema,
    /// Entity state disagrees with the backend
    UnsynchronizedEntity,
    /// Entity metadata is invalid or incomplete
    InvalidMapping,
    /// Everything else
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub message: String,
    /// Backend result code, when the driver reports one
    pub code: Option<i32>,
    /// The statement that failed, when known
    pub statement: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    /// Table the synchronization ran against
    pub table: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityError {
    /// Entity class the operation targeted
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingError {
    /// Entity class whose metadata is at fault
    pub entity: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

impl Error {
    /// Classify this error into its coarse kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Provider(_) => ErrorKind::Provider,
            Error::Schema(_) => ErrorKind::UnsynchronizedSchema,
            Error::Entity(_) => ErrorKind::UnsynchronizedEntity,
            Error::Mapping(_) | Error::Type(_) => ErrorKind::InvalidMapping,
            Error::Config(_) | Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Shorthand for a backend failure with just a message.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Error::Provider(ProviderError {
            message: message.into(),
            code: None,
            statement: None,
        })
    }

    /// Shorthand for an entity consistency failure.
    #[must_use]
    pub fn entity(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Entity(EntityError {
            entity: entity.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a metadata derivation failure.
    #[must_use]
    pub fn mapping(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Mapping(MappingError {
            entity: entity.into(),
            message: message.into(),
        })
    }

    /// Shorthand for a residual failure.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Error::Other(message.into())
    }

    /// Get the statement that caused this error, if available.
    #[must_use]
    pub fn statement(&self) -> Option<&str> {
        match self {
            Error::Provider(e) => e.statement.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Provider(e) => write!(f, "Provider error: {}", e),
            Error::Schema(e) => write!(f, "Unsynchronized schema: {}", e),
            Error::Entity(e) => write!(f, "Unsynchronized entity: {}", e),
            Error::Mapping(e) => write!(f, "Invalid mapping: {}", e),
            Error::Type(e) => write!(f, "Invalid mapping: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (table '{}')", self.message, self.table)
    }
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (entity '{}')", self.message, self.entity)
    }
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (entity '{}')", self.message, self.entity)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Error::Provider(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<EntityError> for Error {
    fn from(err: EntityError) -> Self {
        Error::Entity(err)
    }
}

impl From<MappingError> for Error {
    fn from(err: MappingError) -> Self {
        Error::Mapping(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for OrmKit operations.
pub type Result<T> = std::result::Result<T, Error>;
