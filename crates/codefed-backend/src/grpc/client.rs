//! Unary client for the `codefed.CodeSearch` service.
//!
//! Calls wait for the service instead of failing fast: while the channel
//! reports `Unavailable` the call is retried with backoff. Callers bound the
//! wait by dropping the future (deadline or cancellation).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, IntoRequest, Status};
use tracing::debug;

use super::proto;
use crate::error::BackendError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// The two RPCs the gRPC adapter needs.
#[async_trait]
pub trait CodeSearchService: Send + Sync + 'static {
    async fn search(&self, query: proto::Query) -> Result<proto::CodeSearchResult, Status>;

    async fn info(&self) -> Result<proto::ServerInfo, Status>;
}

/// tonic-backed [`CodeSearchService`].
///
/// Cloning is cheap; clones share the underlying channel.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    inner: tonic::client::Grpc<Channel>,
}

impl GrpcClient {
    /// Build a client that connects on first use.
    pub fn connect_lazy(address: &str) -> Result<Self, BackendError> {
        let channel = Endpoint::from_shared(address.to_string())?.connect_lazy();
        Ok(Self {
            inner: tonic::client::Grpc::new(channel),
        })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Clone + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        retry_unavailable(path, || self.unary_once(path, message.clone())).await
    }

    async fn unary_once<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))?;

        let response = grpc
            .unary(
                message.into_request(),
                PathAndQuery::from_static(path),
                ProstCodec::default(),
            )
            .await?;
        Ok(response.into_inner())
    }
}

/// Run `call` until it returns anything other than `Unavailable`.
async fn retry_unavailable<T, F, Fut>(path: &str, mut call: F) -> Result<T, Status>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Status>>,
{
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match call().await {
            Err(status) if status.code() == Code::Unavailable => {
                debug!(
                    rpc = path,
                    error = status.message(),
                    backoff_ms = backoff.as_millis() as u64,
                    "service unavailable, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            other => return other,
        }
    }
}

#[async_trait]
impl CodeSearchService for GrpcClient {
    async fn search(&self, query: proto::Query) -> Result<proto::CodeSearchResult, Status> {
        self.unary(proto::SEARCH_PATH, query).await
    }

    async fn info(&self) -> Result<proto::ServerInfo, Status> {
        self.unary(proto::INFO_PATH, proto::InfoRequest {}).await
    }
}
