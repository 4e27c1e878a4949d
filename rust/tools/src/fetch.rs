//! One-shot retrieval of the backend tool list.

use async_trait::async_trait;
use common::ToolRecord;
use serde_json::Value;
use thiserror::Error;

/// What a completed fetch produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Body was a JSON array.
    Tools(Vec<ToolRecord>),
    /// Body was valid JSON but not an array.
    NotAList,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("backend returned HTTP {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("response body is not JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[async_trait]
pub trait ToolFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError>;
}

/// `GET <url>` over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpToolFetcher {
    client: reqwest::Client,
}

impl HttpToolFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolFetcher for HttpToolFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        match serde_json::from_slice::<Value>(&body)? {
            Value::Array(tools) => Ok(FetchOutcome::Tools(tools)),
            _ => Ok(FetchOutcome::NotAList),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_array() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tools")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!([{ "name": "lookup_order" }, { "name": "end_call" }]).to_string())
            .create_async()
            .await;

        let fetcher = HttpToolFetcher::new();
        let outcome = fetcher
            .fetch(&format!("{}/tools", server.url()))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::Tools(vec![json!({ "name": "lookup_order" }), json!({ "name": "end_call" })])
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_object_is_not_a_list() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/tools")
            .with_status(200)
            .with_body(json!({ "tools": [] }).to_string())
            .create_async()
            .await;

        let outcome = HttpToolFetcher::new()
            .fetch(&format!("{}/tools", server.url()))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotAList);
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/tools")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = HttpToolFetcher::new()
            .fetch(&format!("{}/tools", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_fetch_garbage_body_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/tools")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let err = HttpToolFetcher::new()
            .fetch(&format!("{}/tools", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_fetch_uses_supplied_client() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/tools")
            .match_header("user-agent", "gateway/test")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = reqwest::Client::builder()
            .user_agent("gateway/test")
            .build()
            .unwrap();
        let outcome = HttpToolFetcher::with_client(client)
            .fetch(&format!("{}/tools", server.url()))
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Tools(vec![]));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpToolFetcher::new()
            .fetch(&format!("http://{}/tools", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
