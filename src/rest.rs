//! Read-only REST client for the polled, persisted records.
//!
//! The live stores never call these endpoints themselves — a consuming view
//! polls on its own cadence (interval or refetch trigger) and merges the
//! result with the store's live list via [`merge`](crate::merge::merge).
//! Polling is independent of connection state: it works before a connection
//! opens, during a reconnect delay, and after disconnect.
//!
//! Only available with the `rest` feature (enabled by default).

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ArenaLiveConfig;
use crate::error::{ArenaLiveError, Result};
use crate::protocol::{BattleTurn, JobSnapshot, PlaygroundMessage};

/// One page of a paginated listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    /// Total records across all pages.
    pub total: u64,
}

/// Client for the persisted-record endpoints.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    /// Create a client against the given API base URL (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Create a client from a shared [`ArenaLiveConfig`].
    pub fn from_config(config: &ArenaLiveConfig) -> Self {
        Self::new(config.api_base_url.clone())
    }

    /// Attach a bearer token sent with every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// List the persisted turns of a battle session, newest page layout as
    /// served by the backend.
    pub async fn list_turns(
        &self,
        session_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<BattleTurn>> {
        let url = format!(
            "{}/api/v1/sessions/{session_id}/turns?page={page}&page_size={page_size}",
            self.base_url
        );
        self.get_json(url).await
    }

    /// List the persisted messages of a playground conversation.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<PlaygroundMessage>> {
        let url = format!(
            "{}/api/v1/playground/conversations/{conversation_id}/messages?page={page}&page_size={page_size}",
            self.base_url
        );
        self.get_json(url).await
    }

    /// Fetch the persisted snapshot of a fine-tuning job.
    pub async fn get_job(&self, job_id: &str) -> Result<JobSnapshot> {
        let url = format!("{}/api/v1/finetuning/jobs/{job_id}", self.base_url);
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let mut request = self.http.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ArenaLiveError::UnexpectedStatus { status, body })
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a fresh local port.
    async fn one_shot_http(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn list_turns_parses_a_page() {
        let body = r#"{"items":[{"turn_number":1,"verdict":"refused"}],"page":1,"page_size":20,"total":1}"#;
        let base = one_shot_http("HTTP/1.1 200 OK", body).await;

        let page = RestClient::new(base).list_turns("s1", 1, 20).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].turn_number, 1);
        assert_eq!(page.items[0].verdict.as_deref(), Some("refused"));
    }

    #[tokio::test]
    async fn get_job_parses_a_snapshot() {
        let body = r#"{"job_id":"job-1","status":"running","progress_pct":45.0,"current_step":"Training epoch 2"}"#;
        let base = one_shot_http("HTTP/1.1 200 OK", body).await;

        let job = RestClient::new(base).get_job("job-1").await.unwrap();
        assert_eq!(job.job_id, "job-1");
        assert_eq!(job.progress_pct, 45.0);
        assert!(job.logs.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_surfaced_with_body() {
        let base = one_shot_http("HTTP/1.1 404 Not Found", r#"{"detail":"no such session"}"#).await;

        let err = RestClient::new(base)
            .list_turns("missing", 1, 20)
            .await
            .unwrap_err();
        match err {
            ArenaLiveError::UnexpectedStatus { status, body } => {
                assert_eq!(status.as_u16(), 404);
                assert!(body.contains("no such session"));
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    }
}
