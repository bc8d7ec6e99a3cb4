use crate::error::StoreResult;
use crate::model::{DocumentSummary, Instance, Timestamp};

/// Persistent, document-scoped collection of synchronized instances.
///
/// Every accepted write stamps the record with the store's own clock; the
/// stamp is strictly increasing per `(document_guid, id)`. Concurrent writes
/// to the same key resolve as last write wins in arrival order.
#[async_trait::async_trait]
pub trait InstanceStore: Send + Sync {
    /// Insert or replace the instance, returning the stored record with its new stamp
    async fn upsert(&self, document_guid: &str, instance: Instance) -> StoreResult<Instance>;

    /// Upsert each element independently. Results come back in input order.
    async fn upsert_batch(
        &self,
        document_guid: &str,
        instances: Vec<Instance>,
    ) -> Vec<StoreResult<Instance>> {
        let mut results = Vec::with_capacity(instances.len());
        for instance in instances {
            results.push(self.upsert(document_guid, instance).await);
        }
        results
    }

    async fn get(&self, document_guid: &str, id: &str) -> StoreResult<Instance>;

    /// Instances of a document, optionally only those stamped after `since`.
    /// Callers must not rely on the order.
    async fn list(&self, document_guid: &str, since: Option<Timestamp>)
        -> StoreResult<Vec<Instance>>;

    /// Remove the instance. Returns whether it existed; absence is not an error.
    async fn delete(&self, document_guid: &str, id: &str) -> StoreResult<bool>;

    /// Count instances in one document, or across all documents for `None`
    async fn count(&self, document_guid: Option<&str>) -> StoreResult<u64>;

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>>;

    /// Cheap liveness probe of the backing database
    async fn ping(&self) -> StoreResult<()>;
}

pub trait Store: InstanceStore + Send + Sync {}
impl<T: InstanceStore + Send + Sync> Store for T {}
