pub mod bulk;
pub mod config;
pub mod error;
pub mod escape;
pub mod events;
pub mod executor;
pub mod models;
pub mod normalize;
pub mod pagination;
pub mod retry;
pub mod traits;
pub mod transport;

#[cfg(test)]
mod testing;

pub use bulk::{serialize_batch, BulkIndexer};
pub use config::{ClientConfig, RetryConfig};
pub use error::{ErrorInfo, ErrorKind, Result, SearchError};
pub use escape::escape_query_string;
pub use events::{ClientEvent, TracingEventSink};
pub use executor::QueryExecutor;
pub use models::{
    BatchFailure, BulkOptions, BulkResult, Document, DocumentRef, IndexAction, Pagination,
    QueryOptions, SearchRequest, SearchResponse,
};
pub use normalize::NormalizeContext;
pub use pagination::{compute_pagination, PagePlan};
pub use retry::RetryPolicy;
pub use traits::{EventSink, Transport};
pub use transport::{HttpTransport, TransportResponse};
