use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A user offered by the mention typeahead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub username: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl Suggestion {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            id: None,
            avatar_url: None,
        }
    }

    /// Text shown in the suggestion list.
    pub fn token_text(&self) -> String {
        format!("@{}", self.username)
    }
}

/// Source of mention candidates. Matching semantics belong to the
/// implementation; results are shown in the order returned.
pub trait UserSearch: Send + Sync + 'static {
    type Error: std::error::Error + Send + 'static;

    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Suggestion>, Self::Error>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub seq: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub seq: u64,
    pub query: String,
    pub suggestions: Vec<Suggestion>,
}

/// Runs user searches on a background task.
///
/// Requests queue up on an unbounded channel and the worker always jumps to
/// the newest one, so a burst of keystrokes costs one round trip. Responses
/// carry the request's sequence number; deciding whether a response is still
/// wanted is up to [`MentionTypeahead`](super::MentionTypeahead).
#[derive(Debug)]
pub struct SearchWorker {
    request_tx: Option<mpsc::UnboundedSender<SearchRequest>>,
    response_rx: mpsc::UnboundedReceiver<SearchResponse>,
    worker_handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn<S>(source: S) -> Self
    where
        S: UserSearch,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel::<SearchRequest>();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<SearchResponse>();

        let handle = tokio::runtime::Handle::current();
        let worker_handle = handle.spawn(run_search_worker(
            Arc::new(source),
            request_rx,
            response_tx,
        ));

        Self {
            request_tx: Some(request_tx),
            response_rx,
            worker_handle: Some(worker_handle),
        }
    }

    pub fn request(&self, request: SearchRequest) {
        if let Some(request_tx) = &self.request_tx
            && request_tx.send(request).is_err()
        {
            tracing::debug!("search worker is gone; dropping request");
        }
    }

    /// Waits for the next response. Returns `None` once the worker has
    /// stopped.
    pub async fn recv(&mut self) -> Option<SearchResponse> {
        self.response_rx.recv().await
    }

    pub async fn shutdown(&mut self) {
        self.request_tx.take();
        if let Some(worker_handle) = self.worker_handle.take() {
            let _ = worker_handle.await;
        }
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        self.request_tx.take();
        if let Some(worker_handle) = self.worker_handle.take() {
            worker_handle.abort();
        }
    }
}

async fn run_search_worker<S>(
    source: Arc<S>,
    mut request_rx: mpsc::UnboundedReceiver<SearchRequest>,
    response_tx: mpsc::UnboundedSender<SearchResponse>,
) where
    S: UserSearch,
{
    while let Some(mut request) = request_rx.recv().await {
        while let Ok(newer) = request_rx.try_recv() {
            request = newer;
        }

        tracing::debug!(seq = request.seq, query = %request.query, "searching users");
        match source.search(&request.query).await {
            Ok(suggestions) => {
                let response = SearchResponse {
                    seq: request.seq,
                    query: request.query,
                    suggestions,
                };
                if response_tx.send(response).is_err() {
                    return;
                }
            }
            Err(err) => {
                tracing::warn!(seq = request.seq, error = %err, "user search failed");
            }
        }
    }
}
