//! HTTP client for the chat server's `/api` endpoints.

mod client;
pub mod error;
pub mod types;

pub use client::ChatClient;
pub use error::{Error, Result};
pub use types::{
    Channel, LoginResponse, MarkedRead, MarkedUnread, ProfileUpdate, ProfileUpdated,
    RegisterRequest, RegisterResponse, User,
};
