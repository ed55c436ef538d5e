use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectorError>;

#[derive(Debug, Error)]
pub enum DetectorError {
    /// No source file produced a single usable row.
    #[error("no valid training data found: the corpus is empty")]
    EmptyCorpus,

    /// A two-class model cannot be fit when only one label is present.
    #[error("training data contains a single class ({label}); both phishing and safe examples are required")]
    SingleClass { label: String },

    #[error("empty vocabulary: no document contains a usable term")]
    EmptyVocabulary,

    #[error("invalid training data: {0}")]
    InvalidTrainingData(String),

    /// Missing, unreadable, corrupt or mismatched model artifacts.
    #[error("model not available or corrupt at {}: {reason}", path.display())]
    ModelUnavailable { path: PathBuf, reason: String },

    #[error("file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DetectorError {
    pub(crate) fn model_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        DetectorError::ModelUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by what the user passed in rather than by the
    /// model or the pipeline itself.
    pub fn is_user_input(&self) -> bool {
        matches!(self, DetectorError::InputNotFound { .. })
    }
}
