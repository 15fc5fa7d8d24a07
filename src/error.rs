use thiserror::Error;

/// Main error type of the pivot bridge.
/// Aggregates the errors of every module; engine errors pass through unchanged.
#[derive(Error, Debug)]
pub enum RustyPivotError {
    #[error("{0}")]
    WithContextError(String),

    // Third-party library errors
    #[error("{0}")]
    JsonError(#[from] serde_json::Error),

    // Input module errors
    #[error("{0}")]
    InputError(#[from] crate::input::InputError),

    // Database module errors
    #[error("{0}")]
    ColumnError(#[from] crate::database::column::ColumnError),

    // View module errors
    #[error("{0}")]
    ViewError(#[from] crate::view::config::ViewError),

    // Table module errors
    #[error("{0}")]
    TableError(#[from] crate::table::TableError),

    // Engine errors
    #[error("{0}")]
    EngineError(#[from] crate::bridge::EngineError),
}

pub type Result<T> = std::result::Result<T, RustyPivotError>;

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RustyPivotError::WithContextError(format!("{}: {}", message, e)))
    }
}
