use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Streaming(#[from] loopcache_streaming::StreamingError),

    #[error("connection failed: {0}")]
    Connection(#[from] std::io::Error),

    #[error("the node reported OutOfRoom")]
    OutOfRoom,

    #[error("exceeded the retry budget chasing NotOwner redirects")]
    RetryBudgetExhausted,

    #[error("unexpected response from node: {0}")]
    UnexpectedResponse(String),

    #[error("the ring has no owner for this key (cluster is empty)")]
    NoOwner,
}
