//! Transport abstraction.
//!
//! A [`Requester`] sends one [`CompiledRoute`] and returns the raw response.
//! Rate limiting and retries, if any, live behind this trait: an
//! implementation may wait or retry internally, but each `execute` call must
//! resolve to exactly one outcome.

use crate::error::RemoteFailure;
use crate::route::{CompiledRoute, Method};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Status and decoded JSON body of a remote response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl RawResponse {
    pub fn new(status: u16, body: Option<serde_json::Value>) -> Self {
        Self { status, body }
    }

    /// A 200 response carrying `body`.
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(200, Some(body))
    }

    /// A 204 response with no body.
    pub fn no_content() -> Self {
        Self::new(204, None)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RemoteFailure> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| RemoteFailure::new(Some(self.status), "response has no body"))?;
        Ok(T::deserialize(body)?)
    }

    /// Returns the body as a JSON array.
    pub fn array(&self) -> Result<&[serde_json::Value], RemoteFailure> {
        self.body
            .as_ref()
            .and_then(serde_json::Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| RemoteFailure::new(Some(self.status), "expected a JSON array body"))
    }
}

/// Sends compiled routes to the remote service.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn execute(&self, route: &CompiledRoute) -> Result<RawResponse, RemoteFailure>;
}

/// Configuration for [`HttpRequester`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL every route path is appended to.
    pub api_base_url: String,
    /// Value of the `Authorization` header. Empty means unauthenticated.
    pub token: String,
    pub user_agent: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://discord.com/api/v10".to_string(),
            token: String::new(),
            user_agent: concat!("hearth (", env!("CARGO_PKG_VERSION"), ")").to_string(),
            timeout_secs: 30,
        }
    }
}

/// [`Requester`] backed by a reqwest client.
pub struct HttpRequester {
    config: RestConfig,
    client: Client,
}

impl HttpRequester {
    pub fn new(config: RestConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn url(&self, route: &CompiledRoute) -> String {
        format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            route.path()
        )
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn execute(&self, route: &CompiledRoute) -> Result<RawResponse, RemoteFailure> {
        let url = self.url(route);
        let mut request = match route.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !self.config.token.is_empty() {
            request = request.header("Authorization", &self.config.token);
        }
        if let Some(reason) = route.reason() {
            request = request.header("X-Audit-Log-Reason", urlencoding::encode(reason).into_owned());
        }
        if let Some(body) = route.body() {
            request = request.json(body);
        }

        debug!("sending {route}");
        let response = request
            .send()
            .await
            .map_err(|e| RemoteFailure::transport(format!("request failed: {e}")))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteFailure::new(Some(status), format!("failed to read body: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(RemoteFailure::new(Some(status), format!("{route} returned {status}: {text}")));
        }

        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(&text)?)
        };
        Ok(RawResponse::new(status, body))
    }
}

/// A scripted requester for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every route it receives and answers from a script, falling
    /// back to a fixed response once the script is exhausted.
    pub struct MockRequester {
        calls: AtomicUsize,
        history: Mutex<Vec<CompiledRoute>>,
        script: Mutex<VecDeque<Result<RawResponse, RemoteFailure>>>,
        fallback: RawResponse,
        latency: Option<Duration>,
    }

    impl MockRequester {
        /// Answers every call with `204 No Content`.
        pub fn new() -> Self {
            Self::with_fallback(RawResponse::no_content())
        }

        pub fn with_fallback(fallback: RawResponse) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                history: Mutex::new(Vec::new()),
                script: Mutex::new(VecDeque::new()),
                fallback,
                latency: None,
            }
        }

        /// Delays every response by `latency`.
        #[must_use]
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Queues the outcome of the next unanswered call.
        pub fn push(&self, outcome: Result<RawResponse, RemoteFailure>) {
            self.script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push_back(outcome);
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn history(&self) -> Vec<CompiledRoute> {
            self.history
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    impl Default for MockRequester {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl Requester for MockRequester {
        async fn execute(&self, route: &CompiledRoute) -> Result<RawResponse, RemoteFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(route.clone());
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            let scripted = self
                .script
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();
            scripted.unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }
}
