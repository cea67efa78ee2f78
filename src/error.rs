//! Error types for the dotman core.

use std::path::PathBuf;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, DotmanError>;

/// Errors raised by the tracking index, relocator and profile manager.
#[derive(Debug, thiserror::Error)]
pub enum DotmanError {
    /// No profile of that name in the tracking index
    #[error("config '{0}' does not exist")]
    ProfileNotFound(String),

    /// A directory expected on disk is absent or not a directory
    #[error("not a directory: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Profile name collision during creation
    #[error("config '{0}' already exists")]
    AlreadyExists(String),

    /// Directory name already belongs to another profile
    #[error("'{dir}' is already tracked by config '{profile}'")]
    AlreadyTracked { dir: String, profile: String },

    /// The underlying rename failed
    #[error("failed to move {}: {source}", .path.display())]
    RelocationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Name is not usable as a profile or as a single directory component
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Tracking document could not be parsed or serialized
    #[error("malformed tracking document {}: {source}", .path.display())]
    Document {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl DotmanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the "not found" kind (profile or directory)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProfileNotFound(_) | Self::DirectoryNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_kind() {
        assert!(DotmanError::ProfileNotFound("work".into()).is_not_found());
        assert!(DotmanError::DirectoryNotFound(PathBuf::from("/x")).is_not_found());
        assert!(!DotmanError::AlreadyExists("work".into()).is_not_found());
    }

    #[test]
    fn test_messages() {
        let err = DotmanError::AlreadyTracked {
            dir: "nvim".into(),
            profile: "work".into(),
        };
        assert_eq!(err.to_string(), "'nvim' is already tracked by config 'work'");

        let err = DotmanError::RelocationFailed {
            path: PathBuf::from("/home/u/.config/nvim"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("failed to move /home/u/.config/nvim"));
    }
}
