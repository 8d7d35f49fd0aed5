//! Resource id extraction from service responses.

use common::ResourceId;
use serde_json::Value;

/// Keys under which services report the id of a resource, in lookup order.
const ID_KEYS: [&str; 3] = ["id", "_id", "ID"];

/// Finds the resource id in a JSON response body.
///
/// Only non-empty string values are accepted.
pub fn extract_resource_id(body: &Value) -> Option<ResourceId> {
    let object = body.as_object()?;
    ID_KEYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_str))
        .find(|id| !id.trim().is_empty())
        .map(ResourceId::from)
}
