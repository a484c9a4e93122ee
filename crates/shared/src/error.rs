use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    EmptyCatalog,
    NotFound,
    Validation,
    Storage,
    Backend,
}

impl ErrorCode {
    /// Process exit status reported by the CLI for this class of failure.
    pub fn exit_status(self) -> i32 {
        match self {
            ErrorCode::EmptyCatalog => 2,
            ErrorCode::NotFound => 3,
            ErrorCode::Validation => 4,
            ErrorCode::Storage => 5,
            ErrorCode::Backend => 6,
        }
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    #[error("no wallpapers available")]
    EmptyCatalog,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
    #[error("failed to apply wallpaper: {0:#}")]
    Backend(#[source] anyhow::Error),
}

impl RotationError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RotationError::EmptyCatalog => ErrorCode::EmptyCatalog,
            RotationError::NotFound(_) => ErrorCode::NotFound,
            RotationError::Validation(_) => ErrorCode::Validation,
            RotationError::Storage(_) => ErrorCode::Storage,
            RotationError::Backend(_) => ErrorCode::Backend,
        }
    }
}

impl From<anyhow::Error> for RotationError {
    fn from(value: anyhow::Error) -> Self {
        Self::Storage(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_distinct_exit_statuses() {
        let statuses = [
            ErrorCode::EmptyCatalog,
            ErrorCode::NotFound,
            ErrorCode::Validation,
            ErrorCode::Storage,
            ErrorCode::Backend,
        ]
        .map(ErrorCode::exit_status);
        for (i, a) in statuses.iter().enumerate() {
            assert_ne!(*a, 0);
            assert!(statuses[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn storage_errors_keep_their_context() {
        let err: RotationError = anyhow::anyhow!("disk gone")
            .context("failed to load cycle")
            .into();
        assert_eq!(err.code(), ErrorCode::Storage);
        assert_eq!(err.to_string(), "storage error: failed to load cycle: disk gone");
    }
}
