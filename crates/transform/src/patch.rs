//! `patchesJson6902`: ordered JSON-patch operations applied to a single target resource.
//!
//! Paths are JSON Pointers (`~0` is `~`, `~1` is `/`, `-` appends to an array).
//! `add` creates missing intermediate objects, so a patch may populate fields
//! that only later transformers would have created.

use kilt_core::{Gvk, KiltError, ResId, ResMap, Resource, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::Transformer;

/// One JSON-patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOp {
    Add { path: String, value: Json },
    Remove { path: String },
    Replace { path: String, value: Json },
    Move { from: String, path: String },
    Copy { from: String, path: String },
    Test { path: String, value: Json },
}

impl PatchOp {
    fn path(&self) -> &str {
        match self {
            Self::Add { path, .. }
            | Self::Remove { path }
            | Self::Replace { path, .. }
            | Self::Move { path, .. }
            | Self::Copy { path, .. }
            | Self::Test { path, .. } => path,
        }
    }

    fn apply(&self, doc: &mut Json) -> std::result::Result<(), String> {
        match self {
            Self::Add { path, value } => add(doc, &pointer(path)?, value.clone()),
            Self::Remove { path } => remove(doc, &pointer(path)?).map(|_| ()),
            Self::Replace { path, value } => {
                let slot = lookup_mut(doc, &pointer(path)?).ok_or_else(|| format!("path {} does not exist", path))?;
                *slot = value.clone();
                Ok(())
            }
            Self::Move { from, path } => {
                if path != from && path.starts_with(&format!("{}/", from)) {
                    return Err(format!("cannot move {} into its own child {}", from, path));
                }
                let v = remove(doc, &pointer(from)?)?;
                add(doc, &pointer(path)?, v)
            }
            Self::Copy { from, path } => {
                let v = lookup(doc, &pointer(from)?).cloned().ok_or_else(|| format!("path {} does not exist", from))?;
                add(doc, &pointer(path)?, v)
            }
            Self::Test { path, value } => match lookup(doc, &pointer(path)?) {
                Some(actual) if actual == value => Ok(()),
                Some(actual) => Err(format!("test failed at {}: expected {}, found {}", path, value, actual)),
                None => Err(format!("test failed: path {} does not exist", path)),
            },
        }
    }
}

/// An ordered list of operations, applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPatch(pub Vec<PatchOp>);

impl JsonPatch {
    /// Parse a JSON or YAML sequence of operations.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, String> {
        serde_yaml::from_slice(bytes).map_err(|e| format!("malformed patch: {}", e))
    }

    pub fn apply(&self, doc: &mut Json) -> std::result::Result<(), String> {
        let mut next = doc.clone();
        for (i, op) in self.0.iter().enumerate() {
            op.apply(&mut next).map_err(|e| format!("operation {} ({}): {}", i, op.path(), e))?;
        }
        *doc = next;
        Ok(())
    }
}

/// Selects the resource a patch applies to, by authored name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchTarget {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl PatchTarget {
    pub fn matches(&self, r: &Resource) -> bool {
        let gvk: Gvk = r.gvk();
        gvk.kind == self.kind
            && gvk.group == self.group
            && (self.version.is_empty() || gvk.version == self.version)
            && r.original_name() == self.name
            && self.namespace.as_deref().map(|ns| r.namespace() == Some(ns)).unwrap_or(true)
    }
}

impl std::fmt::Display for PatchTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let gvk = Gvk::new(self.group.as_str(), self.version.as_str(), self.kind.as_str());
        write!(f, "{} {}", gvk, self.name)?;
        if let Some(ns) = &self.namespace { write!(f, " in {}", ns)?; }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PatchTransformer {
    /// Patch file, for error messages.
    path: String,
    target: PatchTarget,
    patch: JsonPatch,
}

impl PatchTransformer {
    pub fn new(path: impl Into<String>, target: PatchTarget, patch: JsonPatch) -> Self {
        Self { path: path.into(), target, patch }
    }

    pub fn from_bytes(path: impl Into<String>, target: PatchTarget, bytes: &[u8]) -> Result<Self> {
        let path = path.into();
        let patch = JsonPatch::from_bytes(bytes).map_err(|e| KiltError::patch(&path, e))?;
        Ok(Self::new(path, target, patch))
    }
}

impl Transformer for PatchTransformer {
    fn name(&self) -> &'static str { "json6902" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        let hits: Vec<ResId> = m.entries().filter(|(_, r)| self.target.matches(r)).map(|(id, _)| id.clone()).collect();
        let id = match hits.as_slice() {
            [one] => one.clone(),
            [] => return Err(KiltError::patch(&self.path, format!("no resource matches target {}", self.target))),
            many => return Err(KiltError::patch(&self.path, format!("target {} matches {} resources", self.target, many.len()))),
        };
        m.update(&id, |r| {
            self.patch.apply(r.doc_mut()).map_err(|e| KiltError::patch(&self.path, e))?;
            Resource::from_value(r.doc().clone()).map_err(|e| KiltError::patch(&self.path, format!("patched resource is invalid: {}", e)))?;
            Ok(())
        })?;
        debug!(patch = %self.path, target = %id, ops = self.patch.0.len(), "patch applied");
        Ok(())
    }
}

fn pointer(path: &str) -> std::result::Result<Vec<String>, String> {
    if path.is_empty() { return Ok(Vec::new()); }
    let rest = path.strip_prefix('/').ok_or_else(|| format!("pointer {:?} must start with '/'", path))?;
    Ok(rest.split('/').map(|t| t.replace("~1", "/").replace("~0", "~")).collect())
}

fn index(token: &str, len: usize, allow_end: bool) -> std::result::Result<usize, String> {
    if allow_end && token == "-" { return Ok(len); }
    let digits = !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit());
    if !digits || (token.len() > 1 && token.starts_with('0')) {
        return Err(format!("invalid array index {:?}", token));
    }
    let i: usize = token.parse().map_err(|_| format!("invalid array index {:?}", token))?;
    let in_bounds = if allow_end { i <= len } else { i < len };
    if !in_bounds {
        return Err(format!("array index {} out of bounds (len {})", i, len));
    }
    Ok(i)
}

fn lookup<'a>(doc: &'a Json, tokens: &[String]) -> Option<&'a Json> {
    let mut cur = doc;
    for t in tokens {
        cur = match cur {
            Json::Object(obj) => obj.get(t)?,
            Json::Array(items) => items.get(index(t, items.len(), false).ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn lookup_mut<'a>(doc: &'a mut Json, tokens: &[String]) -> Option<&'a mut Json> {
    let mut cur = doc;
    for t in tokens {
        cur = match cur {
            Json::Object(obj) => obj.get_mut(t)?,
            Json::Array(items) => {
                let i = index(t, items.len(), false).ok()?;
                items.get_mut(i)?
            }
            _ => return None,
        };
    }
    Some(cur)
}

/// Walk to the parent of the final token, creating objects for missing keys.
fn parent_for_add<'a>(doc: &'a mut Json, tokens: &[String]) -> std::result::Result<&'a mut Json, String> {
    let mut cur = doc;
    for t in tokens {
        if cur.is_null() { *cur = Json::Object(Map::new()); }
        cur = match cur {
            Json::Object(obj) => obj.entry(t.clone()).or_insert_with(|| Json::Object(Map::new())),
            Json::Array(items) => {
                let i = index(t, items.len(), false)?;
                &mut items[i]
            }
            _ => return Err(format!("cannot traverse scalar at {:?}", t)),
        };
    }
    if cur.is_null() { *cur = Json::Object(Map::new()); }
    Ok(cur)
}

fn add(doc: &mut Json, tokens: &[String], value: Json) -> std::result::Result<(), String> {
    let Some((last, parents)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    match parent_for_add(doc, parents)? {
        Json::Object(obj) => { obj.insert(last.clone(), value); Ok(()) }
        Json::Array(items) => {
            let i = index(last, items.len(), true)?;
            items.insert(i, value);
            Ok(())
        }
        _ => Err(format!("cannot add {:?} to a scalar", last)),
    }
}

fn remove(doc: &mut Json, tokens: &[String]) -> std::result::Result<Json, String> {
    let Some((last, parents)) = tokens.split_last() else {
        return Err("cannot remove the document root".to_string());
    };
    match lookup_mut(doc, parents) {
        Some(Json::Object(obj)) => obj.remove(last).ok_or_else(|| format!("key {:?} does not exist", last)),
        Some(Json::Array(items)) => {
            let i = index(last, items.len(), false)?;
            Ok(items.remove(i))
        }
        _ => Err(format!("parent of {:?} does not exist", last)),
    }
}
