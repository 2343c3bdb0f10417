use thiserror::Error;
use toolshare_core::{StoreError, ToolId};

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid input for {tool}: {message}")]
    InvalidInput { tool: ToolId, message: String },

    #[error("{tool}: no entry named {id}")]
    NotFound { tool: ToolId, id: String },

    #[error("Timer is already running")]
    TimerRunning,
}

impl ToolError {
    pub fn invalid_input(tool: ToolId, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            tool,
            message: message.into(),
        }
    }

    pub fn not_found(tool: ToolId, id: impl Into<String>) -> Self {
        Self::NotFound { tool, id: id.into() }
    }

    pub fn is_out_of_space(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_out_of_space())
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
