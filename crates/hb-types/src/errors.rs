use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the HyperBench system
#[derive(Error, Debug)]
pub enum HbError {
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while reading or writing run artifacts
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Malformed artifact {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("Incomplete run {}: missing {missing}", path.display())]
    Incomplete { path: PathBuf, missing: String },

    #[error("Failed to read {}: {message}", path.display())]
    ReadFailed { path: PathBuf, message: String },

    #[error("Failed to write {}: {message}", path.display())]
    WriteFailed { path: PathBuf, message: String },
}

impl ArtifactError {
    /// Path of the artifact that caused the error.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Malformed { path, .. }
            | Self::Incomplete { path, .. }
            | Self::ReadFailed { path, .. }
            | Self::WriteFailed { path, .. } => path,
        }
    }
}

/// Dataset-related errors
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Dataset not found: {0}")]
    NotFound(String),

    #[error("Invalid data format: {message}")]
    InvalidFormat { message: String },

    #[error("Data loading failed: {message}")]
    LoadingFailed { message: String },

    #[error("Split produced an empty subset for dataset {dataset}")]
    EmptySplit { dataset: String },

    #[error("Index {index} out of range for dataset with {rows} rows")]
    IndexOutOfRange { index: usize, rows: usize },
}

/// Errors raised while evaluating a single configuration
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Estimator error: {message}")]
    Estimator { message: String },

    #[error("Evaluation failed: {message}")]
    Failed { message: String },
}

/// Result type alias for HyperBench operations
pub type HbResult<T> = Result<T, HbError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::HbError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::HbError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HbError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_path() {
        let error = ArtifactError::Malformed {
            path: PathBuf::from("/results/knn/random/1/iris/search.json"),
            message: "expected a list".to_string(),
        };

        let text = error.to_string();
        assert!(text.contains("Malformed artifact"));
        assert!(text.contains("/results/knn/random/1/iris/search.json"));
        assert!(text.contains("expected a list"));
    }

    #[test]
    fn test_error_conversion() {
        let artifact_error = ArtifactError::Incomplete {
            path: PathBuf::from("leaf"),
            missing: "stats.json".to_string(),
        };
        let hb_error: HbError = artifact_error.into();

        match hb_error {
            HbError::Artifact(inner) => assert_eq!(inner.path(), std::path::Path::new("leaf")),
            _ => panic!("Expected Artifact error"),
        }
    }

    #[test]
    fn test_macros() {
        let validation_err = validation_error!("Invalid value: {}", 42);
        assert!(matches!(validation_err, HbError::Validation(_)));
        let internal_err = internal_error!("Something went wrong");
        assert!(matches!(internal_err, HbError::Internal(_)));
        let config_err = config_error!("Missing required field: {}", "seeds");
        assert_eq!(config_err.to_string(), "Configuration error: Missing required field: seeds");
    }
}
