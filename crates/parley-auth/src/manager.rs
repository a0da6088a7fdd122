use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use parley_api::ChatClient;
use parley_db::Store;

use crate::error::{Error, Result};
use crate::store::{CredentialStore, StoredCredential};

/// A logged-in identity on one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub server_url: String,
    pub access_token: String,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

impl Session {
    fn from_stored(server_url: &str, stored: StoredCredential) -> Self {
        Self {
            server_url: server_url.to_string(),
            access_token: stored.access_token,
            user_id: stored.user_id,
            username: stored.username,
        }
    }

    fn to_stored(&self) -> StoredCredential {
        StoredCredential {
            access_token: self.access_token.clone(),
            user_id: self.user_id,
            username: self.username.clone(),
        }
    }
}

/// Logs in against chat servers and remembers the resulting tokens.
pub struct AuthManager {
    store: CredentialStore,
    cache: Mutex<HashMap<String, Session>>,
}

impl AuthManager {
    pub fn new(service_name: impl Into<String>, store: Arc<Mutex<Store>>) -> Self {
        Self {
            store: CredentialStore::new(service_name, store),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Authenticates with the server behind `client` and persists the token.
    pub async fn login(
        &self,
        client: &ChatClient,
        username: &str,
        password: &str,
    ) -> Result<Session> {
        let response = client.login(username, password).await?;
        let user = response.user;
        let session = Session {
            server_url: client.base_url().to_string(),
            access_token: response.access_token,
            user_id: user.as_ref().map(|user| user.id),
            username: Some(
                user.map(|user| user.username)
                    .unwrap_or_else(|| username.to_string()),
            ),
        };

        self.store.save(&session.server_url, &session.to_stored())?;
        self.cache
            .lock()
            .insert(session.server_url.clone(), session.clone());
        tracing::info!(server = %session.server_url, user = ?session.username, "logged in");
        Ok(session)
    }

    pub fn session(&self, server_url: &str) -> Result<Option<Session>> {
        if let Some(session) = self.cache.lock().get(server_url).cloned() {
            return Ok(Some(session));
        }

        let loaded = self
            .store
            .load(server_url)?
            .map(|stored| Session::from_stored(server_url, stored));
        if let Some(ref session) = loaded {
            self.cache
                .lock()
                .insert(server_url.to_string(), session.clone());
        }
        Ok(loaded)
    }

    /// Like [`AuthManager::session`], but a missing login is an error.
    pub fn require_session(&self, server_url: &str) -> Result<Session> {
        self.session(server_url)?
            .ok_or_else(|| Error::NotLoggedIn(server_url.to_string()))
    }

    /// Returns `client` carrying the stored token for its server.
    pub fn authorize(&self, client: &ChatClient) -> Result<ChatClient> {
        let session = self.require_session(client.base_url())?;
        Ok(client.with_token(session.access_token))
    }

    /// Forgets the stored token. Returns whether one existed.
    pub fn logout(&self, server_url: &str) -> Result<bool> {
        self.cache.lock().remove(server_url);
        self.store.delete(server_url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;
    use parley_api::ChatClient;
    use parley_db::Store;
    use serde_json::{Value, json};

    use super::AuthManager;
    use crate::error::Error;

    async fn serve() -> String {
        async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
            if body["password"] == "secret" {
                (
                    StatusCode::OK,
                    Json(json!({
                        "access_token": "jwt-1",
                        "user": {"id": 5, "username": body["username"], "avatar_url": null}
                    })),
                )
            } else {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": "Invalid credentials"})),
                )
            }
        }

        let app = Router::new().route("/api/auth/login", post(login));
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn manager() -> (AuthManager, Arc<Mutex<Store>>) {
        let store = Arc::new(Mutex::new(Store::open_in_memory().unwrap()));
        (AuthManager::new("parley-test", Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn login_persists_session() {
        let client = ChatClient::new(&serve().await).unwrap();
        let (manager, store) = manager();

        let session = manager.login(&client, "alice", "secret").await.unwrap();
        assert_eq!(session.access_token, "jwt-1");
        assert_eq!(session.user_id, Some(5));

        // A fresh manager over the same store sees the login.
        let reloaded = AuthManager::new("parley-test", store);
        let found = reloaded.session(client.base_url()).unwrap().unwrap();
        assert_eq!(found, session);

        let authorized = reloaded.authorize(&client).unwrap();
        assert_eq!(authorized.token(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn failed_login_stores_nothing() {
        let client = ChatClient::new(&serve().await).unwrap();
        let (manager, _store) = manager();

        let err = manager.login(&client, "alice", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(manager.session(client.base_url()).unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_clears_cache_and_store() {
        let client = ChatClient::new(&serve().await).unwrap();
        let (manager, _store) = manager();
        manager.login(&client, "alice", "secret").await.unwrap();

        assert!(manager.logout(client.base_url()).unwrap());
        assert!(!manager.logout(client.base_url()).unwrap());
        assert!(matches!(
            manager.authorize(&client),
            Err(Error::NotLoggedIn(_))
        ));
    }
}
