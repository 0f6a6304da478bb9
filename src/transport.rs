//! JSON-over-HTTP adapter for the chain's REST endpoints.
use serde_json::Value;
use tracing::debug;

use crate::{
    error::Error,
    types::{BroadcastMode, PostTxResponse, StdTx},
};

/// A thin REST client.
///
/// Non-2xx responses whose body carries the LCD's `{"error": ...}` message
/// surface as [`Error::Server`]; anything else surfaces as
/// [`Error::Transport`].
pub struct RestClient {
    base_url: String,
    client: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET request and parse the response body as JSON.
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        debug!(path, "rest get");
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Issue a POST request with a JSON body and parse the response as JSON.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, Error> {
        debug!(path, "rest post");
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Broadcast a signed transaction.
    pub async fn post_tx(&self, tx: &StdTx, mode: BroadcastMode) -> Result<PostTxResponse, Error> {
        let body = serde_json::json!({ "tx": tx, "mode": mode });
        let value = self.post("/txs", &body).await?;
        serde_json::from_value(value).map_err(|e| Error::Schema(format!("broadcast response: {e}")))
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value, Error> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // The LCD wraps failures as {"error": "..."}; pass the raw
            // message through so embedded ciphertexts stay matchable.
            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                if let Some(message) = value.get("error").and_then(Value::as_str) {
                    return Err(Error::Server {
                        status: status.as_u16(),
                        body: message.to_string(),
                    });
                }
            }
            if !text.trim().is_empty() {
                return Err(Error::Server {
                    status: status.as_u16(),
                    body: text,
                });
            }
            return Err(Error::Transport(format!(
                "unexpected response status {status}"
            )));
        }

        serde_json::from_str(&text).map_err(|e| Error::Schema(format!("response is not JSON: {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::MockChain;

    #[tokio::test]
    async fn get_parses_json() {
        let chain = MockChain::spawn(vec![("/node_info", 200, r#"{"node_info":{"network":"testing"}}"#)]).await;
        let client = RestClient::new(chain.url());
        let value = client.get("/node_info").await.unwrap();
        assert_eq!(value["node_info"]["network"], "testing");
    }

    #[tokio::test]
    async fn server_error_keeps_message_and_status() {
        let chain = MockChain::spawn(vec![(
            "/wasm/contract/secret1abc/query/00",
            500,
            r#"{"error":"contract failed: encrypted: AAAA"}"#,
        )])
        .await;
        let client = RestClient::new(chain.url());
        let err = client
            .get("/wasm/contract/secret1abc/query/00")
            .await
            .unwrap_err();
        match &err {
            Error::Server { status, body } => {
                assert_eq!(*status, 500);
                assert_eq!(body, "contract failed: encrypted: AAAA");
            }
            other => panic!("expected server error, got {other:?}"),
        }
        // The display form carries the HTTP status suffix used by the
        // encrypted-error matchers.
        assert_eq!(err.to_string(), "contract failed: encrypted: AAAA (HTTP 500)");
    }

    #[tokio::test]
    async fn unreachable_is_transport_error() {
        // Port 1 is never listening.
        let client = RestClient::new("http://127.0.0.1:1");
        assert!(matches!(
            client.get("/node_info").await,
            Err(Error::Transport(_))
        ));
    }
}
