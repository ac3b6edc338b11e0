use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vault_sync::{Record, Timestamp};

/// A schemaless record: an `id`, an optional `updated` stamp, and whatever
/// other fields the snapshot carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Timestamp>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record for JsonRecord {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn updated(&self) -> Option<Timestamp> {
        self.updated
    }

    fn set_updated(&mut self, at: Timestamp) {
        self.updated = Some(at);
    }
}
