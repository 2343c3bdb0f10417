use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize preferences: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Failed to render stored value: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] toolshare_core::StoreError),

    #[error(transparent)]
    Core(#[from] toolshare_core::Error),
}
