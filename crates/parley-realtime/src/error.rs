#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event error: {0}")]
    Event(#[from] parley_core::Error),

    #[error("malformed packet: {0:?}")]
    Malformed(String),

    #[error("server refused connection: {0}")]
    Refused(String),

    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
