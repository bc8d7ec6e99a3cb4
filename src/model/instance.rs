use crate::error::{StoreError, StoreResult};
use crate::model::{Id, Timestamp, MAX_KEY_LEN};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 2D placement of an element: position plus rotation in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub rot: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A placed BIM element (room boundary or furniture) as last synchronized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: Id,
    pub document_guid: Id,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub transform: Transform,
    /// Boundary loop for rooms; empty for point-placed furniture.
    #[serde(default)]
    pub points: Vec<Point>,
    /// Extra BIM parameters the viewer may display but the server never interprets.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Assigned by the store on every accepted write.
    #[serde(default)]
    pub last_modified: Timestamp,
}

impl Instance {
    pub fn new(document_guid: impl Into<Id>, id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            document_guid: document_guid.into(),
            category_id: String::new(),
            family_name: String::new(),
            type_name: String::new(),
            transform: Transform::default(),
            points: Vec::new(),
            attributes: Map::new(),
            last_modified: 0,
        }
    }

    pub fn with_transform(mut self, x: f64, y: f64, rot: f64) -> Self {
        self.transform = Transform { x, y, rot };
        self
    }

    pub fn with_points(mut self, points: Vec<Point>) -> Self {
        self.points = points;
        self
    }

    /// Check the record can be written under `document_guid`.
    pub fn validate_for(&self, document_guid: &str) -> StoreResult<()> {
        validate_key("documentGuid", document_guid)?;
        validate_key("id", &self.id)?;
        if self.document_guid != document_guid {
            return Err(StoreError::validation(format!(
                "documentGuid '{}' does not match target document '{}'",
                self.document_guid, document_guid
            )));
        }

        for (field, value) in [
            ("categoryId", &self.category_id),
            ("familyName", &self.family_name),
            ("typeName", &self.type_name),
        ] {
            if value.contains('\0') {
                return Err(StoreError::validation(format!(
                    "{} must not contain NUL characters",
                    field
                )));
            }
        }
        if self
            .attributes
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value))
        {
            return Err(StoreError::validation(
                "attributes must not contain NUL characters",
            ));
        }

        let t = &self.transform;
        if !(t.x.is_finite() && t.y.is_finite() && t.rot.is_finite()) {
            return Err(StoreError::validation("transform values must be finite numbers"));
        }
        if let Some(i) = self.points.iter().position(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(StoreError::validation(format!(
                "points[{}] must have finite coordinates",
                i
            )));
        }
        Ok(())
    }

    /// Copy every client-owned field from `incoming`, keeping identity and stamp.
    pub fn apply_update(&mut self, incoming: Instance) {
        self.category_id = incoming.category_id;
        self.family_name = incoming.family_name;
        self.type_name = incoming.type_name;
        self.transform = incoming.transform;
        self.points = incoming.points;
        self.attributes = incoming.attributes;
    }
}

/// Body of a push request. Only `id` is mandatory; the document comes from the path.
///
/// `lastModified` is not part of the payload: anything a client sends under
/// that name is dropped during decoding.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePayload {
    pub id: Option<Id>,
    pub document_guid: Option<Id>,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub type_name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl InstancePayload {
    /// Decode a single JSON element, turning shape errors into validation failures.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        if !value.is_object() {
            return Err(StoreError::validation("instance payload must be a JSON object"));
        }
        serde_json::from_value(value)
            .map_err(|e| StoreError::validation(format!("malformed instance payload: {}", e)))
    }

    /// Best-effort id for reporting, even when the payload is otherwise invalid.
    pub fn id_hint(value: &Value) -> Option<Id> {
        value.get("id").and_then(Value::as_str).map(str::to_string)
    }

    /// Bind the payload to its target document (and optionally a path id).
    pub fn into_instance(self, document_guid: &str, path_id: Option<&str>) -> StoreResult<Instance> {
        if let Some(body_guid) = &self.document_guid {
            if body_guid != document_guid {
                return Err(StoreError::validation(format!(
                    "documentGuid '{}' in body does not match '{}' in path",
                    body_guid, document_guid
                )));
            }
        }

        let id = match (self.id, path_id) {
            (Some(body_id), Some(path_id)) if body_id != path_id => {
                return Err(StoreError::validation(format!(
                    "id '{}' in body does not match '{}' in path",
                    body_id, path_id
                )));
            }
            (Some(body_id), _) => body_id,
            (None, Some(path_id)) => path_id.to_string(),
            (None, None) => return Err(StoreError::validation("id is required")),
        };

        let instance = Instance {
            id,
            document_guid: document_guid.to_string(),
            category_id: self.category_id,
            family_name: self.family_name,
            type_name: self.type_name,
            transform: self.transform,
            points: self.points,
            attributes: self.attributes,
            last_modified: 0,
        };
        instance.validate_for(document_guid)?;
        Ok(instance)
    }
}

fn validate_key(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(format!("{} is required", field)));
    }
    if value.contains('\0') {
        return Err(StoreError::validation(format!(
            "{} must not contain NUL characters",
            field
        )));
    }
    if value.chars().count() > MAX_KEY_LEN {
        return Err(StoreError::validation(format!(
            "{} exceeds {} characters",
            field, MAX_KEY_LEN
        )));
    }
    Ok(())
}

/// NUL cannot be stored in PostgreSQL text or jsonb values.
fn contains_nul(value: &Value) -> bool {
    match value {
        Value::String(s) => s.contains('\0'),
        Value::Array(items) => items.iter().any(contains_nul),
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key.contains('\0') || contains_nul(value)),
        _ => false,
    }
}
