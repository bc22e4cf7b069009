use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TierpackError {
    #[error("Empty pattern in rule set")]
    EmptyPattern,

    #[error("Ambiguous rule kind for '{pattern}' - set kind = \"name\" or \"component\"")]
    AmbiguousKind { pattern: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Config parse error in {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Config file not found: {path} (run `tierpack config init`)")]
    ConfigNotFound { path: PathBuf },

    #[error("Source root does not exist: {path}")]
    RootNotFound { path: PathBuf },

    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("Cannot write artifact {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TierpackError>;

impl TierpackError {
    /// Whether this error was raised while validating configuration,
    /// before any traversal started.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyPattern
                | Self::AmbiguousKind { .. }
                | Self::InvalidPattern { .. }
                | Self::ConfigParse { .. }
                | Self::ConfigNotFound { .. }
                | Self::TomlDe(_)
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_config_error() => 2,
            Self::Output { .. } => 3,
            Self::RootNotFound { .. } | Self::ManifestNotFound { .. } => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(TierpackError::EmptyPattern.exit_code(), 2);
        assert_eq!(
            TierpackError::AmbiguousKind {
                pattern: "vendor".into()
            }
            .exit_code(),
            2
        );
        let output = TierpackError::Output {
            path: PathBuf::from("dist"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(output.exit_code(), 3);
        assert_eq!(
            TierpackError::RootNotFound {
                path: PathBuf::from("missing")
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn test_output_error_message_names_path() {
        let err = TierpackError::Output {
            path: PathBuf::from("dist/plugin"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let msg = err.to_string();
        assert!(msg.contains("dist/plugin"));
        assert!(msg.contains("disk full"));
    }
}
