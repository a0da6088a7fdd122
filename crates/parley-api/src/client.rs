use std::sync::Arc;

use parley_core::{Suggestion, UserSearch};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{
    Channel, ErrorBody, LoginResponse, MarkedRead, MarkedUnread, ProfileUpdate, ProfileUpdated,
    RegisterRequest, RegisterResponse,
};

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";
const REQUEST_FAILED: &str = "Request failed";

struct ClientState {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Client for the chat server's REST API. Cheap to clone.
#[derive(Clone)]
pub struct ChatClient {
    state: Arc<ClientState>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.state.base_url)
            .field("authenticated", &self.state.token.is_some())
            .finish()
    }
}

impl ChatClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)?;
        Ok(Self {
            state: Arc::new(ClientState {
                http: reqwest::Client::new(),
                base_url: parsed.as_str().trim_end_matches('/').to_string(),
                token: None,
            }),
        })
    }

    /// Returns a client that sends `token` as a bearer credential.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            state: Arc::new(ClientState {
                http: self.state.http.clone(),
                base_url: self.state.base_url.clone(),
                token: Some(token.into()),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    pub fn token(&self) -> Option<&str> {
        self.state.token.as_deref()
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = self
            .request(Method::POST, "/api/auth/login")
            .json(&json!({ "username": username, "password": password }));
        send_json(request, LOGIN_FAILED).await
    }

    pub async fn register(&self, input: &RegisterRequest) -> Result<RegisterResponse> {
        let request = self
            .request(Method::POST, "/api/auth/register")
            .json(input);
        send_json(request, REGISTRATION_FAILED).await
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let request = self.authed(Method::GET, "/api/channels")?;
        send_json(request, REQUEST_FAILED).await
    }

    pub async fn create_channel(&self, name: &str, description: Option<&str>) -> Result<Channel> {
        #[derive(Serialize)]
        struct Body<'a> {
            name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            description: Option<&'a str>,
        }

        let request = self
            .authed(Method::POST, "/api/channels")?
            .json(&Body { name, description });
        send_json(request, REQUEST_FAILED).await
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<Suggestion>> {
        let request = self
            .authed(Method::GET, "/api/users/search")?
            .query(&[("q", query)]);
        send_json(request, REQUEST_FAILED).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileUpdated> {
        let request = self.authed(Method::PUT, "/api/profile")?.json(update);
        send_json(request, REQUEST_FAILED).await
    }

    pub async fn mark_all_mentions_read(&self) -> Result<MarkedRead> {
        let request = self.authed(Method::POST, "/api/mentions/mark_all_read")?;
        send_json(request, REQUEST_FAILED).await
    }

    pub async fn mark_mention_unread(&self, message_id: i64) -> Result<MarkedUnread> {
        let path = format!("/api/mentions/{message_id}/mark_unread");
        let request = self.authed(Method::POST, &path)?;
        send_json(request, REQUEST_FAILED).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.state.base_url);
        tracing::debug!(%method, %url, "api request");
        self.state.http.request(method, url)
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.state.token.as_deref().ok_or(Error::MissingToken)?;
        Ok(self.request(method, path).bearer_auth(token))
    }
}

impl UserSearch for ChatClient {
    type Error = Error;

    async fn search(&self, query: &str) -> Result<Vec<Suggestion>> {
        self.search_users(query).await
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder, fallback: &str) -> Result<T> {
    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(rejection(response, fallback).await);
    }
    Ok(response.json().await?)
}

async fn rejection(response: Response, fallback: &str) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.error.or(body.msg))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());

    tracing::debug!(status, %message, "api request rejected");
    Error::Rejected { status, message }
}
