use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::error::{StoreError, StoreResult};
use crate::model::{next_modified, now_millis, DocumentSummary, Id, Instance, Timestamp};
use crate::store::traits::InstanceStore;

/// Process-local store used by tests and by `db.backend = "memory"`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Documents keyed by guid, instances within a document keyed by id
    documents: RwLock<HashMap<Id, BTreeMap<Id, Instance>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InstanceStore for MemoryStore {
    async fn upsert(&self, document_guid: &str, instance: Instance) -> StoreResult<Instance> {
        instance.validate_for(document_guid)?;

        let mut documents = self.documents.write();
        let document = documents.entry(document_guid.to_string()).or_default();

        let stored = match document.get_mut(&instance.id) {
            Some(existing) => {
                existing.last_modified = next_modified(Some(existing.last_modified), now_millis());
                existing.apply_update(instance);
                existing.clone()
            }
            None => {
                let mut fresh = instance;
                fresh.last_modified = next_modified(None, now_millis());
                document.insert(fresh.id.clone(), fresh.clone());
                fresh
            }
        };
        Ok(stored)
    }

    async fn get(&self, document_guid: &str, id: &str) -> StoreResult<Instance> {
        self.documents
            .read()
            .get(document_guid)
            .and_then(|document| document.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(document_guid, id))
    }

    async fn list(
        &self,
        document_guid: &str,
        since: Option<Timestamp>,
    ) -> StoreResult<Vec<Instance>> {
        let documents = self.documents.read();
        let Some(document) = documents.get(document_guid) else {
            return Ok(Vec::new());
        };

        Ok(document
            .values()
            .filter(|instance| since.map_or(true, |t| instance.last_modified > t))
            .cloned()
            .collect())
    }

    async fn delete(&self, document_guid: &str, id: &str) -> StoreResult<bool> {
        let mut documents = self.documents.write();
        let Some(document) = documents.get_mut(document_guid) else {
            return Ok(false);
        };

        let existed = document.remove(id).is_some();
        if document.is_empty() {
            documents.remove(document_guid);
        }
        Ok(existed)
    }

    async fn count(&self, document_guid: Option<&str>) -> StoreResult<u64> {
        let documents = self.documents.read();
        let count = match document_guid {
            Some(guid) => documents.get(guid).map_or(0, BTreeMap::len),
            None => documents.values().map(BTreeMap::len).sum(),
        };
        Ok(count as u64)
    }

    async fn list_documents(&self) -> StoreResult<Vec<DocumentSummary>> {
        let documents = self.documents.read();
        let mut summaries: Vec<DocumentSummary> = documents
            .iter()
            .map(|(guid, instances)| DocumentSummary {
                document_guid: guid.clone(),
                instance_count: instances.len() as u64,
                last_modified: instances
                    .values()
                    .map(|i| i.last_modified)
                    .max()
                    .unwrap_or(0),
            })
            .collect();
        summaries.sort_by(|a, b| a.document_guid.cmp(&b.document_guid));
        Ok(summaries)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
