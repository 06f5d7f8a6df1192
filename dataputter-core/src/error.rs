use thiserror::Error;

#[derive(Error, Debug)]
pub enum PutterError {
    #[error("metadata store error: {0}")]
    Metadata(String),

    #[error("write node rpc error: {0}")]
    NodeRpc(String),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("delete token mismatch")]
    AuthFailure,

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("ticket not found: {0}")]
    TicketNotFound(String),

    #[error("ticket {0} is not in saved state")]
    TicketNotSaved(String),

    #[error("completion barrier timed out for object {0}")]
    CompletionTimeout(String),

    #[error("router reported failure: {0}")]
    RouterFailure(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redis::RedisError> for PutterError {
    fn from(error: redis::RedisError) -> Self {
        PutterError::Metadata(error.to_string())
    }
}

impl From<reqwest::Error> for PutterError {
    fn from(error: reqwest::Error) -> Self {
        PutterError::NodeRpc(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PutterError>;
