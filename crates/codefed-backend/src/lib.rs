//! codefed Backend - Federation layer over remote code search engines
//!
//! This crate provides a single query and result model in front of several
//! kinds of search engine:
//! - [`GrpcSearch`]: engines speaking the `codefed.CodeSearch` gRPC protocol
//! - [`TrigramSearch`]: trigram index engines behind a JSON RPC endpoint
//!
//! Each [`Backend`] keeps a cached copy of its engine's metadata (display
//! name, indexed trees, index time) in an [`IndexInfo`] store, refreshed in
//! the background without blocking searches.
//!
//! ## Example
//!
//! ```ignore
//! use codefed_backend::{Backend, Query, SearchContext};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Backend::grpc("linux", "http://localhost:9999", Duration::from_secs(60))?;
//!     backend.start().await;
//!
//!     let query = Query::new("spin_lock").with_file(r"\.c$");
//!     let ctx = SearchContext::with_timeout(Duration::from_secs(10));
//!     let result = backend.search_with(&ctx, &query).await?;
//!     for m in &result.results {
//!         println!("{}:{}: {}", m.path, m.line_number, m.line);
//!     }
//!
//!     backend.shutdown().await;
//!     Ok(())
//! }
//! ```

mod backend;
mod error;
pub mod grpc;
pub mod refresh;
mod registry;
mod store;
mod traits;
pub mod trigram;
mod types;

pub use backend::{Backend, SearchContext};
pub use codefed_config::BackendKind;
pub use error::{BackendError, QueryError};
pub use grpc::GrpcSearch;
pub use refresh::RefreshHandle;
pub use registry::{create_backend, BackendInfo, BackendRegistry};
pub use store::{IndexInfo, IndexSnapshot, IndexUpdate};
pub use traits::Searchable;
pub use trigram::TrigramSearch;
pub use types::*;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
