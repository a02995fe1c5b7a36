//! JSON RPC client for the trigram index engine.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::native::{ListOptions, NativeQuery, RepoList, SearchOptions, SearchResult};
use crate::error::BackendError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The two calls the trigram adapter needs.
#[async_trait]
pub trait TrigramService: Send + Sync + 'static {
    async fn search(
        &self,
        query: &NativeQuery,
        opts: &SearchOptions,
    ) -> Result<SearchResult, BackendError>;

    async fn list(&self, query: &NativeQuery, opts: &ListOptions) -> Result<RepoList, BackendError>;
}

#[derive(Serialize)]
struct RpcRequest<'a, O> {
    query: &'a NativeQuery,
    opts: &'a O,
}

/// HTTP client speaking `POST {address}/api/search` and `POST {address}/api/list`.
#[derive(Debug, Clone)]
pub struct TrigramRpcClient {
    client: Client,
    base: Url,
}

impl TrigramRpcClient {
    /// Create a client for the engine at `address`.
    pub fn new(address: &str) -> Result<Self, BackendError> {
        let mut base = Url::parse(address)
            .map_err(|e| BackendError::connection(format!("invalid address '{address}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, name: &str) -> Result<Url, BackendError> {
        self.base
            .join(&format!("api/{name}"))
            .map_err(|e| BackendError::connection(format!("invalid endpoint '{name}': {e}")))
    }

    async fn call<O, R>(&self, name: &str, query: &NativeQuery, opts: &O) -> Result<R, BackendError>
    where
        O: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = self.endpoint(name)?;
        debug!(%url, query = %query, "trigram rpc");

        let response = self
            .client
            .post(url)
            .json(&RpcRequest { query, opts })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::connection("request timed out")
                } else if e.is_connect() {
                    BackendError::connection(format!("connection failed: {e}"))
                } else {
                    BackendError::connection(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| {
                    BackendError::connection(format!("failed to read response: {e}"))
                })?;
                Ok(serde_json::from_slice(&body)?)
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(BackendError::remote_server(status.as_u16(), body))
            }
        }
    }
}

#[async_trait]
impl TrigramService for TrigramRpcClient {
    async fn search(
        &self,
        query: &NativeQuery,
        opts: &SearchOptions,
    ) -> Result<SearchResult, BackendError> {
        self.call("search", query, opts).await
    }

    async fn list(
        &self,
        query: &NativeQuery,
        opts: &ListOptions,
    ) -> Result<RepoList, BackendError> {
        self.call("list", query, opts).await
    }
}
