//! Model-related error types

use thiserror::Error;

use bo_core::data::DataError;
use bo_core::design::DesignError;

use crate::engine::EngineError;

/// Model-related errors
#[derive(Debug, Error)]
pub enum ModelError {
    /// Design assembly or formula evaluation error
    #[error("Design error: {0}")]
    Design(#[from] DesignError),

    /// Data-related error
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// The external sampling engine failed
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Draws were requested before a successful sampling run
    #[error("Model has not been sampled")]
    NotSampled,

    /// Operation not defined for this model shape
    #[error("Unsupported operation: {message}")]
    Unsupported {
        /// What was requested and why it is unavailable
        message: String,
    },

    /// Persisted model state is inconsistent
    #[error("Invalid fitted state: {message}")]
    State {
        /// Check that failed
        message: String,
    },

    /// Fitted state could not be encoded or decoded as JSON
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
