//! Fetch Transport
//!
//! The store talks to the backend only through [`Transport`]. The production
//! implementation is [`HttpTransport`], a reqwest client that owns request
//! timeouts and resolves relative data-source URLs against a base URL.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::error::{FetchError, FetchResult};
use crate::config::HttpConfig;

/// Outbound request surface used by the store
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the raw body
    async fn fetch_text(&self, url: &str) -> FetchResult<String>;

    /// GET `url` and parse the body as JSON
    async fn fetch_json(&self, url: &str) -> FetchResult<serde_json::Value> {
        let body = self.fetch_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: Option<String>,
}

impl HttpTransport {
    /// Create a transport with the configured timeout and base URL
    pub fn new(config: &HttpConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self::with_client(client, &config.base_url))
    }

    /// Wrap an existing client; an empty `base_url` disables relative URLs
    pub fn with_client(client: Client, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            client,
            base_url: (!base_url.is_empty()).then(|| base_url.to_string()),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Turn a data-source URL into an absolute request target
    pub fn resolve_url(&self, url: &str) -> FetchResult<String> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.to_string());
        }

        match &self.base_url {
            Some(base) if url.starts_with('/') => Ok(format!("{}{}", base, url)),
            Some(base) => Ok(format!("{}/{}", base, url)),
            None => Err(FetchError::InvalidUrl(format!(
                "relative URL '{}' without a base URL",
                url
            ))),
        }
    }

    async fn get(&self, url: &str) -> FetchResult<reqwest::Response> {
        let target = self.resolve_url(url)?;
        tracing::debug!(url = %target, "GET");

        let response = self.client.get(&target).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: target,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> FetchResult<String> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn fetch_json(&self, url: &str) -> FetchResult<serde_json::Value> {
        let body = self.get(url).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scriptable in-memory transport for store tests

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct MockTransport {
        responses: Mutex<HashMap<String, FetchResult<String>>>,
        delays: Mutex<HashMap<String, Duration>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Answer requests whose path is `path` with `body`
        pub(crate) fn respond(&self, path: &str, body: &str) {
            self.responses
                .lock()
                .unwrap()
                .insert(path.to_string(), Ok(body.to_string()));
        }

        /// Reject requests whose path is `path`
        pub(crate) fn fail(&self, path: &str, err: FetchError) {
            self.responses
                .lock()
                .unwrap()
                .insert(path.to_string(), Err(err));
        }

        /// Hold responses for `path` for `delay`
        pub(crate) fn delay(&self, path: &str, delay: Duration) {
            self.delays.lock().unwrap().insert(path.to_string(), delay);
        }

        /// Every URL requested so far, in order
        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        pub(crate) fn requests_to(&self, path: &str) -> Vec<String> {
            self.requests()
                .into_iter()
                .filter(|url| url.split('?').next() == Some(path))
                .collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn fetch_text(&self, url: &str) -> FetchResult<String> {
            self.requests.lock().unwrap().push(url.to_string());

            let path = url.split('?').next().unwrap_or(url).to_string();
            let delay = self.delays.lock().unwrap().get(&path).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            self.responses
                .lock()
                .unwrap()
                .get(&path)
                .cloned()
                .unwrap_or_else(|| {
                    Err(FetchError::Status {
                        status: 404,
                        url: url.to_string(),
                    })
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, http::Uri, routing::get, Json, Router};

    async fn serve() -> String {
        let app = Router::new()
            .route("/text", get(|| async { "hello" }))
            .route(
                "/json",
                get(|| async { Json(serde_json::json!({ "changes": [1, 2] })) }),
            )
            .route(
                "/echo",
                get(|uri: Uri| async move { uri.query().unwrap_or("").to_string() }),
            )
            .route(
                "/missing",
                get(|| async { (StatusCode::NOT_FOUND, "nope") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(&HttpConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
            ..HttpConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_url() {
        let http = transport("http://localhost:8888/");
        assert_eq!(http.base_url(), Some("http://localhost:8888"));
        assert_eq!(
            http.resolve_url("/metrics/db").unwrap(),
            "http://localhost:8888/metrics/db"
        );
        assert_eq!(
            http.resolve_url("metrics/db").unwrap(),
            "http://localhost:8888/metrics/db"
        );
        assert_eq!(
            http.resolve_url("https://other/x").unwrap(),
            "https://other/x"
        );

        let bare = transport("");
        assert!(matches!(
            bare.resolve_url("/metrics"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_text_and_json() {
        let base = serve().await;
        let http = transport(&base);

        assert_eq!(http.fetch_text("/text").await.unwrap(), "hello");

        let json = http.fetch_json("/json").await.unwrap();
        assert_eq!(json["changes"][1], 2);

        let echoed = http.fetch_text("/echo?from=a%20b&to=now").await.unwrap();
        assert_eq!(echoed, "from=a%20b&to=now");
    }

    #[tokio::test]
    async fn test_status_and_decode_errors() {
        let base = serve().await;
        let http = transport(&base);

        let err = http.fetch_text("/missing").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));

        let err = http.fetch_json("/text").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let http = transport("http://127.0.0.1:9");
        let err = http.fetch_text("/text").await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Unavailable(_) | FetchError::Request(_)
        ));
    }
}
