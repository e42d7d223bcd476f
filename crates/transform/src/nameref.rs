//! Rewrite references to ConfigMaps and Secrets to their final names.
//!
//! References are found anywhere in a referrer's document under the pod-spec keys
//! `configMap`, `configMapKeyRef`, `configMapRef`, `secret`, `secretKeyRef`, `secretRef`
//! and `imagePullSecrets`. The referenced resource must live in the referrer's namespace.

use kilt_core::{ResId, ResMap, Result};
use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::Transformer;

const REFERABLE_KINDS: &[&str] = &["ConfigMap", "Secret"];

#[derive(Debug, Clone)]
struct Candidate {
    prefix: String,
    suffix: String,
    final_name: String,
}

/// `(kind, authored name, namespace)` -> resources that could be meant.
type Index = FxHashMap<(String, String, String), Vec<Candidate>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct NameReferenceTransformer;

impl Transformer for NameReferenceTransformer {
    fn name(&self) -> &'static str { "name-reference" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        let mut index: Index = FxHashMap::default();
        for (id, r) in m.entries() {
            if !REFERABLE_KINDS.contains(&id.gvk.kind.as_str()) { continue; }
            index
                .entry((id.gvk.kind.clone(), id.name.clone(), id.namespace.clone()))
                .or_default()
                .push(Candidate { prefix: id.prefix.clone(), suffix: id.suffix.clone(), final_name: r.name().to_string() });
        }
        if index.is_empty() { return Ok(()); }

        m.rewrite(|r| {
            if REFERABLE_KINDS.contains(&r.kind()) { return Ok(()); }
            let referrer = r.id();
            let lookup = |kind: &str, name: &str| resolve(&index, &referrer, kind, name);
            walk(r.doc_mut(), &lookup);
            Ok(())
        })
    }
}

fn resolve(index: &Index, referrer: &ResId, kind: &str, name: &str) -> Option<String> {
    let found = index.get(&(kind.to_string(), name.to_string(), referrer.namespace.clone()))?;
    let pick = match found.as_slice() {
        [one] => one,
        many => match many.iter().find(|c| c.prefix == referrer.prefix && c.suffix == referrer.suffix) {
            Some(c) => c,
            None => {
                warn!(referrer = %referrer, kind, name, candidates = many.len(), "ambiguous reference left unchanged");
                return None;
            }
        },
    };
    (pick.final_name != name).then(|| pick.final_name.clone())
}

fn walk(node: &mut Json, resolve: &dyn Fn(&str, &str) -> Option<String>) {
    match node {
        Json::Object(obj) => {
            for (key, value) in obj.iter_mut() {
                match key.as_str() {
                    "configMap" | "configMapKeyRef" | "configMapRef" => rename(value, "name", "ConfigMap", resolve),
                    "secret" => {
                        rename(value, "secretName", "Secret", resolve);
                        rename(value, "name", "Secret", resolve);
                    }
                    "secretKeyRef" | "secretRef" => rename(value, "name", "Secret", resolve),
                    "imagePullSecrets" => {
                        if let Some(items) = value.as_array_mut() {
                            for item in items { rename(item, "name", "Secret", resolve); }
                        }
                    }
                    _ => {}
                }
                walk(value, resolve);
            }
        }
        Json::Array(items) => {
            for item in items { walk(item, resolve); }
        }
        _ => {}
    }
}

fn rename(holder: &mut Json, field: &str, kind: &str, resolve: &dyn Fn(&str, &str) -> Option<String>) {
    let Some(slot) = holder.get_mut(field) else { return };
    let Some(current) = slot.as_str() else { return };
    if let Some(next) = resolve(kind, current) {
        debug!(kind, from = current, to = %next, "reference updated");
        *slot = Json::String(next);
    }
}
