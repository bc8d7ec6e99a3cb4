use crate::model::{Id, Timestamp};
use serde::{Deserialize, Serialize};

/// Per-document rollup returned by the document listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub document_guid: Id,
    pub instance_count: u64,
    /// Newest `lastModified` among the document's instances.
    pub last_modified: Timestamp,
}
