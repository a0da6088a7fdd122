/// Failures talking to the chat server.
///
/// Everything falls into two buckets: the request never produced a usable
/// answer ([`Error::is_rejection`] is false), or the server answered with a
/// non-success status and an optional message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("not logged in")]
    MissingToken,

    #[error("{message}")]
    Rejected { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Rejected { status, .. } => Some(*status),
            Error::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}
