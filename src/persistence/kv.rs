//! Key-value store reached over HTTP
//!
//! The snapshot is one blob at `{url}/{key}`: `GET` reads it (404 = nothing
//! stored yet), `PUT` replaces it.

use super::backend::SnapshotBackend;
use crate::config::KvConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::time::Duration;

const NAME: &str = "kv";

/// HTTP key-value snapshot backend
pub struct KvBackend {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl KvBackend {
    /// Build a client for `config`; every request is bounded by `timeout`
    pub fn new(config: &KvConfig, timeout: Duration) -> Result<Self> {
        let base = config.url.trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::Config("remote.kv.url must not be empty".to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/{}", base, config.key),
            token: config.token.clone(),
        })
    }

    /// Full URL of the snapshot blob
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl SnapshotBackend for KvBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn load(&self) -> Result<Option<Bytes>> {
        let response = self
            .authorize(self.client.get(&self.endpoint))
            .send()
            .await
            .map_err(|e| Error::backend(NAME, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| Error::backend(NAME, e))?;
                Ok((!body.is_empty()).then_some(body))
            }
            status => Err(Error::backend(NAME, format!("GET returned {}", status))),
        }
    }

    async fn save(&self, data: Bytes) -> Result<()> {
        let response = self
            .authorize(self.client.put(&self.endpoint))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(data)
            .send()
            .await
            .map_err(|e| Error::backend(NAME, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::backend(NAME, format!("PUT returned {}", status)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> KvConfig {
        KvConfig {
            url: url.to_string(),
            key: "parley-memory".to_string(),
            token: None,
        }
    }

    #[test]
    fn test_endpoint_joins_key() {
        let backend = KvBackend::new(&config("http://kv.local/v1/"), Duration::from_secs(1)).unwrap();
        assert_eq!(backend.endpoint(), "http://kv.local/v1/parley-memory");
    }

    #[test]
    fn test_empty_url_rejected() {
        assert!(matches!(
            KvBackend::new(&config(""), Duration::from_secs(1)),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_backend_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let backend = KvBackend::new(&config("http://127.0.0.1:9"), Duration::from_millis(500)).unwrap();
        let err = backend.save(Bytes::from_static(b"{}")).await.unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
    }
}
