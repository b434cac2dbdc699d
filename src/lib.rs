//! Resilient client layer for Elasticsearch-compatible search engines.
//!
//! One [`TransportPool`] bounds in-flight requests in total and per route;
//! each [`EsClient`] addresses one endpoint through it and exposes document
//! CRUD, bulk writes (including the time-windowed [`BufferedBulkWriter`]),
//! scrolled pagination, and snapshot administration. Transport failures are
//! classified and retried per [`RetryPolicy`]; requests carrying a body are
//! never retried on unclassified failures, so writes cannot be duplicated
//! blindly.
//!
//! ```
//! use std::sync::Arc;
//! use es_bridge::{ClientConf, Endpoint, EsClient, EsVersion, TransportPool};
//!
//! # async fn run() -> es_bridge::EsResult<()> {
//! let conf = ClientConf::default();
//! let endpoint = Endpoint::new("local", "http://localhost:9200", EsVersion::Es5);
//! let pool = Arc::new(TransportPool::new(&conf, std::slice::from_ref(&endpoint))?);
//! let client = EsClient::new(endpoint, pool, conf.retry_policy());
//!
//! if let Some(source) = client.select_by_id("logs", "event", "1").await? {
//!     println!("{source}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod bulk;
pub mod conf;
pub mod error;
pub mod es_client;
pub mod executor;
pub mod models;
pub mod retry;
pub mod scroll;
pub mod snapshot;
pub mod transport;

pub use bulk::BufferedBulkWriter;
pub use conf::{BasicAuth, ClientConf, Config, Endpoint, EsVersion};
pub use error::{EsError, EsResult};
pub use es_client::EsClient;
pub use executor::{HttpResponse, RequestExecutor};
pub use models::bulk::{render_bulk, BulkItem, BulkOp, BulkOutcome};
pub use models::scroll_response::{ScrollDoc, ScrollResponse};
pub use models::server_info::ServerInfo;
pub use retry::{FailureKind, RetryPolicy};
pub use scroll::{ScrollCursor, SCROLL_KEEP_ALIVE};
pub use snapshot::RepositoryConf;
pub use transport::{TransportPermit, TransportPool};
