use thiserror::Error;

pub type BrambleResult<T, E = BrambleError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum BrambleError {
    #[error("Not support: {0}")]
    NotSupport(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool is full and no frame is evictable")]
    BufferPoolFull,

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
