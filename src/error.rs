//! Error type shared by every pipeline stage.

pub type Result<T> = std::result::Result<T, EqualizeError>;

#[derive(Debug, thiserror::Error)]
pub enum EqualizeError {
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Dispatch or buffer-transfer failure. Aborts the whole run; any
    /// intermediate buffers from the run are invalid.
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl From<rayon::ThreadPoolBuildError> for EqualizeError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        EqualizeError::Backend(format!("failed to build worker pool: {err}"))
    }
}
