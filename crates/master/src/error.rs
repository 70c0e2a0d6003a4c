use thiserror::Error;

pub type Result<T> = std::result::Result<T, MasterError>;

#[derive(Debug, Error)]
pub enum MasterError {
    #[error(transparent)]
    Ring(#[from] loopcache_corelib::Error),

    #[error(transparent)]
    Streaming(#[from] loopcache_streaming::StreamingError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
