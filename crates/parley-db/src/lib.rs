pub mod error;
mod migration;
pub mod server_credentials;
pub mod store;

pub use error::{Error, Result};
pub use server_credentials::{ServerCredential, ServerCredentials};
pub use store::Store;
