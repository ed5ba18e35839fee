//! Remote Cache Client
//!
//! A [`Cache`] backed by another instance's HTTP API, so that a `Sharder`
//! can spread keys over several servers.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::cache::{Cache, Entry, Value};
use crate::config::Credentials;
use crate::error::{CacheError, Result};
use crate::models::ErrorResponse;

fn remote(err: impl std::fmt::Display) -> CacheError {
    CacheError::Remote(err.to_string())
}

// == Remote Cache ==
/// HTTP client for a remote cache server.
///
/// The server serializes its own calls, so a sharder over remote caches
/// can be built with `need_lock` cleared.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    http: reqwest::Client,
    base: Url,
    credentials: Option<Credentials>,
}

impl RemoteCache {
    // == Constructor ==
    /// Creates a client for the server at `base_url`.
    ///
    /// # Arguments
    /// * `base_url` - e.g. `http://10.0.0.2:8080`
    /// * `timeout` - Per-request timeout
    /// * `credentials` - Basic auth pair, if the server requires one
    pub fn new(
        base_url: &str,
        timeout: StdDuration,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let base = Url::parse(base_url).map_err(remote)?;
        if base.cannot_be_a_base() {
            return Err(CacheError::Remote(format!("not a base URL: {}", base_url)));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(remote)?;

        Ok(Self {
            http,
            base,
            credentials,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.http.request(method, url);
        match &self.credentials {
            Some(creds) => request.basic_auth(&creds.login, Some(&creds.password)),
            None => request,
        }
    }

    /// Sends `request` and decodes the answer.
    ///
    /// A 400 carries an error message, mapped back to its error kind; any
    /// other failure is reported as `Remote`.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(remote)?;
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(remote);
        }
        if status == StatusCode::BAD_REQUEST {
            if let Ok(body) = response.json::<ErrorResponse>().await {
                return Err(CacheError::from_message(&body.error));
            }
        }

        debug!("Remote cache {} answered {}", self.base, status);
        Err(CacheError::Remote(format!("unexpected status {}", status)))
    }
}

#[async_trait]
impl Cache for RemoteCache {
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<Entry> {
        let mut url = self.url(&[key]);
        if ttl != Duration::zero() {
            let nanos = ttl.num_nanoseconds().unwrap_or(if ttl < Duration::zero() {
                i64::MIN
            } else {
                i64::MAX
            });
            url.query_pairs_mut()
                .append_pair("ttl", &format!("{}ns", nanos));
        }

        self.send(self.request(Method::POST, url).json(&value)).await
    }

    async fn get(&self, key: &str) -> Result<Entry> {
        self.send(self.request(Method::GET, self.url(&[key]))).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _: String = self
            .send(self.request(Method::DELETE, self.url(&[key])))
            .await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.send(self.request(Method::GET, self.url(&[]))).await
    }

    async fn get_at_index(&self, key: &str, index: &str) -> Result<JsonValue> {
        self.send(self.request(Method::GET, self.url(&[key, index])))
            .await
    }
}
