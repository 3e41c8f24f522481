//! Top-level error wrapper types.

use crate::{ConfigError, TalkError};

/// This is the foundation error enum for everything the `lion` binary does.
///
/// # Examples
///
/// ```
/// use lion_error::{ConfigError, LionError};
///
/// let err: LionError = ConfigError::parse("lion.toml", "bad port").into();
/// assert!(format!("{}", err).contains("Configuration Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum LionErrorKind {
    /// Shard-talk messaging error
    #[from(TalkError)]
    Talk(TalkError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Lion error with kind discrimination.
///
/// # Examples
///
/// ```
/// use lion_error::{LionResult, ConfigError};
///
/// fn might_fail() -> LionResult<()> {
///     Err(ConfigError::read("lion.toml", "not found"))?
/// }
///
/// match might_fail() {
///     Ok(_) => println!("Success"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Lion Error: {}", _0)]
pub struct LionError(Box<LionErrorKind>);

impl LionError {
    /// Create a new error from a kind.
    pub fn new(kind: LionErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &LionErrorKind {
        &self.0
    }
}

// Generic From implementation for any type that converts to LionErrorKind
impl<T> From<T> for LionError
where
    T: Into<LionErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Lion operations.
pub type LionResult<T> = std::result::Result<T, LionError>;
