pub mod error;
mod manager;
mod store;

pub use error::{Error, Result};
pub use manager::{AuthManager, Session};
pub use store::{CredentialStore, StoredCredential};
