//! Decode resource files (one or more YAML/JSON documents) into [`Resource`]s.

use serde::Deserialize;
use serde_json::Value as Json;

use crate::{doc, KiltError, Resource, Result};

fn max_yaml_bytes() -> usize {
    std::env::var("KILT_MAX_YAML_BYTES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(1_000_000) // 1 MiB default
}

fn max_yaml_nodes() -> usize {
    std::env::var("KILT_MAX_YAML_NODES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(100_000)
}

fn invalid(path: &str, reason: impl Into<String>) -> KiltError {
    KiltError::InvalidResource { path: path.to_string(), reason: reason.into() }
}

/// Parse every document in `bytes`. Empty documents are skipped and `*List` kinds
/// are flattened into their items. `path` is only used for error messages.
pub fn resources_from_bytes(path: &str, bytes: &[u8]) -> Result<Vec<Resource>> {
    if bytes.len() > max_yaml_bytes() {
        return Err(invalid(path, format!("payload too large (>{} bytes)", max_yaml_bytes())));
    }
    let mut out = Vec::new();
    for de in serde_yaml::Deserializer::from_slice(bytes) {
        let val = serde_yaml::Value::deserialize(de).map_err(|e| invalid(path, format!("parsing YAML: {}", e)))?;
        if val.is_null() { continue; }
        let json = serde_json::to_value(val).map_err(|e| invalid(path, format!("converting YAML to JSON: {}", e)))?;
        if doc::node_budget_exceeded(&json, max_yaml_nodes()) {
            return Err(invalid(path, format!("document too complex (>{} nodes)", max_yaml_nodes())));
        }
        push_document(path, json, &mut out)?;
    }
    Ok(out)
}

fn push_document(path: &str, json: Json, out: &mut Vec<Resource>) -> Result<()> {
    let is_list = json.get("kind").and_then(|k| k.as_str()).map(|k| k.ends_with("List")).unwrap_or(false);
    if is_list {
        if let Some(Json::Array(items)) = json.get("items") {
            for item in items.iter().cloned() {
                push_document(path, item, out)?;
            }
            return Ok(());
        }
    }
    let res = Resource::from_value(json).map_err(|e| invalid(path, e.to_string()))?;
    out.push(res);
    Ok(())
}
