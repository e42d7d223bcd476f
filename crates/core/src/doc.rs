//! Path helpers over the generic document (`serde_json::Value`).
//!
//! Paths are slices of object keys, e.g. `&["spec", "template", "metadata", "labels"]`.
//! Array traversal is left to callers that know the shape they walk.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

pub fn get_path<'a>(root: &'a Json, path: &[&str]) -> Option<&'a Json> {
    let mut cur = root;
    for seg in path {
        cur = cur.as_object()?.get(*seg)?;
    }
    Some(cur)
}

pub fn get_path_mut<'a>(root: &'a mut Json, path: &[&str]) -> Option<&'a mut Json> {
    let mut cur = root;
    for seg in path {
        cur = cur.as_object_mut()?.get_mut(*seg)?;
    }
    Some(cur)
}

pub fn get_str<'a>(root: &'a Json, path: &[&str]) -> Option<&'a str> {
    get_path(root, path).and_then(|v| v.as_str())
}

/// Walk `path`, creating empty objects for missing or null segments.
/// Returns `None` when an existing non-object value is in the way.
pub fn ensure_object<'a>(root: &'a mut Json, path: &[&str]) -> Option<&'a mut Map<String, Json>> {
    let mut cur = root;
    if cur.is_null() { *cur = Json::Object(Map::new()); }
    for seg in path {
        let obj = cur.as_object_mut()?;
        let next = obj.entry(seg.to_string()).or_insert_with(|| Json::Object(Map::new()));
        if next.is_null() { *next = Json::Object(Map::new()); }
        cur = next;
    }
    cur.as_object_mut()
}

/// Set `value` at `path`, creating intermediate objects. Returns false if the path is blocked.
pub fn set_path(root: &mut Json, path: &[&str], value: Json) -> bool {
    let Some((last, parents)) = path.split_last() else { return false };
    match ensure_object(root, parents) {
        Some(obj) => { obj.insert(last.to_string(), value); true }
        None => false,
    }
}

/// Set-or-overwrite every entry of `entries` as a string value.
pub fn merge_string_map(target: &mut Map<String, Json>, entries: &BTreeMap<String, String>) {
    for (k, v) in entries {
        target.insert(k.clone(), Json::String(v.clone()));
    }
}

/// Collect a string-valued object into an ordered map; non-string values are skipped.
pub fn string_map(v: Option<&Json>) -> BTreeMap<String, String> {
    v.and_then(|v| v.as_object())
        .map(|obj| obj.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

/// True when the document holds at least `max` nodes. Stops counting early.
pub fn node_budget_exceeded(v: &Json, max: usize) -> bool {
    fn walk(v: &Json, cur: &mut usize, max: usize) {
        if *cur >= max { return; }
        *cur += 1;
        match v {
            Json::Object(map) => {
                for vv in map.values() {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            Json::Array(arr) => {
                for vv in arr {
                    if *cur >= max { break; }
                    walk(vv, cur, max);
                }
            }
            _ => {}
        }
    }
    let mut count = 0usize;
    walk(v, &mut count, max);
    count >= max
}

/// Rebuild the value with every object's keys inserted in sorted order, so that
/// serialization is canonical whichever map backend serde_json was built with.
pub fn canonical(v: &Json) -> Json {
    match v {
        Json::Object(map) => {
            let sorted: BTreeMap<&String, &Json> = map.iter().collect();
            let mut out = Map::new();
            for (k, vv) in sorted { out.insert(k.clone(), canonical(vv)); }
            Json::Object(out)
        }
        Json::Array(arr) => Json::Array(arr.iter().map(canonical).collect()),
        other => other.clone(),
    }
}
