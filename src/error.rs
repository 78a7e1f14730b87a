//! Error types and handling for letterbox

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for letterbox operations
pub type Result<T> = std::result::Result<T, LetterboxError>;

/// The step of the pipeline an error occurred in.
///
/// Rendered in every I/O-flavoured error message so a failure always
/// says what was being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Opening,
    Decoding,
    Creating,
    Encoding,
    Listing,
    CreatingOutputDir,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Opening => "opening",
            Self::Decoding => "decoding",
            Self::Creating => "creating",
            Self::Encoding => "encoding",
            Self::Listing => "listing",
            Self::CreatingOutputDir => "creating output directory",
        };
        f.write_str(name)
    }
}

/// Main error type for letterbox operations
#[derive(Debug, Error)]
pub enum LetterboxError {
    /// I/O failure while performing a given phase
    #[error("{phase} {path:?}: {source}")]
    IoError {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Source data could not be decoded as an image
    #[error("decoding {path:?}: {message}")]
    DecodeError { path: PathBuf, message: String },

    /// JPEG encoding failed
    #[error("encoding {path:?}: {source}")]
    EncodeError {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Skip check could not decide between "exists" and "missing"
    #[error("cannot determine state of {path:?}: {source}")]
    AmbiguousStat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Aspect ratio string rejected
    #[error("invalid aspect ratio {input:?}: {reason}")]
    InvalidAspect { input: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),

    /// Runtime failures (join errors, closed semaphores)
    #[error("System error: {message}")]
    SystemError { message: String },
}

impl LetterboxError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new I/O error tagged with the phase that failed
    pub fn io(phase: Phase, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoError {
            phase,
            path: path.into(),
            source,
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        Self::DecodeError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid aspect error
    pub fn invalid_aspect<S: Into<String>>(input: &str, reason: S) -> Self {
        Self::InvalidAspect {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a new system error
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::SystemError {
            message: message.into(),
        }
    }

    /// Errors that stop a run before any image is dispatched
    pub fn is_fatal_setup(&self) -> bool {
        match self {
            Self::ConfigError { .. } | Self::InvalidAspect { .. } | Self::SerdeError(_) => true,
            Self::IoError { phase, .. } => {
                matches!(phase, Phase::Listing | Phase::CreatingOutputDir)
            }
            Self::DecodeError { .. }
            | Self::EncodeError { .. }
            | Self::AmbiguousStat { .. }
            | Self::SystemError { .. } => false,
        }
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::IoError { path, .. }
            | Self::DecodeError { path, .. }
            | Self::EncodeError { path, .. }
            | Self::AmbiguousStat { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::DecodeError { path, message } => {
                format!("{} is not a readable image: {}", path.display(), message)
            }
            Self::AmbiguousStat { path, source } => format!(
                "Could not tell whether {} was already processed ({}). Fix the file or rerun with --force.",
                path.display(),
                source
            ),
            Self::InvalidAspect { input, reason } => format!(
                "Invalid aspect ratio {:?} ({}); expected A:B such as 16:9",
                input, reason
            ),
            other => other.to_string(),
        }
    }
}

impl From<toml::de::Error> for LetterboxError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<toml::ser::Error> for LetterboxError {
    fn from(err: toml::ser::Error) -> Self {
        Self::SerdeError(format!("TOML serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for LetterboxError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML error: {}", err))
    }
}

/// Low-level errors that can be tagged with a phase and a file
pub trait IntoPhased {
    fn into_phased(self, phase: Phase, file: PathBuf) -> LetterboxError;
}

impl IntoPhased for std::io::Error {
    fn into_phased(self, phase: Phase, file: PathBuf) -> LetterboxError {
        LetterboxError::io(phase, file, self)
    }
}

impl IntoPhased for image::ImageError {
    fn into_phased(self, phase: Phase, file: PathBuf) -> LetterboxError {
        match (phase, self) {
            (Phase::Encoding, source) => LetterboxError::EncodeError { path: file, source },
            (_, image::ImageError::IoError(source)) => LetterboxError::io(phase, file, source),
            (_, other) => LetterboxError::decode(file, other.to_string()),
        }
    }
}

/// Error context extension for adding phase and file information
pub trait ErrorContext<T> {
    /// Tag an error with the phase being performed on `file`
    fn with_file_context(self, phase: Phase, file: &Path) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: IntoPhased,
{
    fn with_file_context(self, phase: Phase, file: &Path) -> Result<T> {
        self.map_err(|e| e.into_phased(phase, file.to_path_buf()))
    }
}
