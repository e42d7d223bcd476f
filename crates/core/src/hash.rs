//! Content hash used for generated resource name suffixes.

use serde_json::{json, Value as Json};
use sha2::{Digest, Sha256};

use crate::{doc, Resource};

const HASH_LEN: usize = 10;

/// Deterministic short token over a resource's content.
///
/// ConfigMaps hash `{kind, name, data[, binaryData]}`, Secrets `{kind, type, name, data}`,
/// anything else its whole document. Object keys are sorted before hashing, so the
/// order in which data entries were produced never changes the token.
pub fn content_hash(res: &Resource) -> String {
    let d = res.doc();
    let payload = match res.kind() {
        "ConfigMap" => {
            let mut m = json!({
                "kind": "ConfigMap",
                "name": res.name(),
                "data": d.get("data").cloned().unwrap_or(Json::Null),
            });
            if let Some(bin) = d.get("binaryData").filter(|b| b.as_object().map(|o| !o.is_empty()).unwrap_or(false)) {
                m["binaryData"] = bin.clone();
            }
            m
        }
        "Secret" => json!({
            "kind": "Secret",
            "type": d.get("type").and_then(|t| t.as_str()).unwrap_or(""),
            "name": res.name(),
            "data": d.get("data").cloned().unwrap_or(Json::Null),
        }),
        _ => d.clone(),
    };
    let encoded = serde_json::to_string(&doc::canonical(&payload)).unwrap_or_default();
    encode(&hex::encode(Sha256::digest(encoded.as_bytes())))
}

/// Take a prefix of the hex digest and swap characters that tend to spell words.
fn encode(hex: &str) -> String {
    hex.chars()
        .take(HASH_LEN)
        .map(|c| match c {
            '0' => 'g',
            '1' => 'h',
            '3' => 'k',
            'a' => 'm',
            'e' => 't',
            other => other,
        })
        .collect()
}
