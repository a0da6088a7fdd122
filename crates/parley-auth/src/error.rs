#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("credential json parse error: {0}")]
    CredentialParse(#[from] serde_json::Error),

    #[error("credential encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("credential crypto error: {0}")]
    Crypto(&'static str),

    #[error("storage error: {0}")]
    Db(#[from] parley_db::Error),

    #[error(transparent)]
    Api(#[from] parley_api::Error),

    #[error("not logged in to {0}")]
    NotLoggedIn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
