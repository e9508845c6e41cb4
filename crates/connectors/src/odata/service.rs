use crate::{error::ServiceError, request::EntityQuery};
use async_trait::async_trait;
use model::records::row::RowHandle;

/// The remote tabular service: schema introspection plus query execution.
///
/// Every method performs at most one network round trip per call, which is
/// what lets callers wrap a single call in a retry policy.
#[async_trait]
pub trait ODataService: Send + Sync {
    // Introspection
    async fn list_tables(&self) -> Result<Vec<String>, ServiceError>;
    async fn table_columns(&self, table: &str) -> Result<Vec<String>, ServiceError>;

    // Execution
    async fn count(&self, query: &EntityQuery) -> Result<usize, ServiceError>;
    async fn fetch(&self, query: &EntityQuery) -> Result<Vec<RowHandle>, ServiceError>;
}
