//! Errors raised while loading shard-talk configuration.

/// What went wrong, and with which configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ConfigErrorKind {
    /// A source could not be read or merged.
    #[display("Could not read {}: {}", origin, message)]
    Read {
        /// File path or source label.
        origin: String,
        /// Underlying error message.
        message: String,
    },

    /// The merged sources did not describe a valid configuration.
    #[display("Could not parse {}: {}", origin, message)]
    Parse {
        /// File path or source label.
        origin: String,
        /// Underlying error message.
        message: String,
    },
}

/// Configuration error with source location.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Configuration Error: {} at line {} in {}", kind, line, file)]
pub struct ConfigError {
    /// The error kind
    pub kind: ConfigErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError at the current location.
    #[track_caller]
    pub fn new(kind: ConfigErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// A source that could not be read.
    ///
    /// # Examples
    ///
    /// ```
    /// use lion_error::ConfigError;
    ///
    /// let err = ConfigError::read("./lion.toml", "permission denied");
    /// assert_eq!(err.origin(), "./lion.toml");
    /// assert!(err.to_string().contains("permission denied"));
    /// ```
    #[track_caller]
    pub fn read(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Read {
            origin: origin.into(),
            message: message.into(),
        })
    }

    /// Sources that merged into an invalid configuration.
    #[track_caller]
    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Parse {
            origin: origin.into(),
            message: message.into(),
        })
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }

    /// The file path or source label the error concerns.
    pub fn origin(&self) -> &str {
        match &self.kind {
            ConfigErrorKind::Read { origin, .. } | ConfigErrorKind::Parse { origin, .. } => origin,
        }
    }
}
