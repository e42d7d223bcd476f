//! Ordered resource map. Every identity uniqueness check in the build goes through here.

use rustc_hash::FxHashMap;
use serde_json::Value as Json;
use tracing::debug;

use crate::{doc, Behavior, KiltError, ResId, Resource, Result};

/// Insertion-ordered `ResId -> Resource` map with pairwise distinct ids.
///
/// Mutating operations are atomic: on error the map is left as it was.
#[derive(Debug, Clone, Default)]
pub struct ResMap {
    entries: Vec<(ResId, Resource)>,
    index: FxHashMap<ResId, usize>,
}

impl ResMap {
    pub fn new() -> Self { Self::default() }

    /// Build a map from resources in order, failing on the first duplicate id.
    pub fn from_resources(resources: impl IntoIterator<Item = Resource>) -> Result<Self> {
        let mut m = Self::new();
        for r in resources { m.insert(r)?; }
        Ok(m)
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, id: &ResId) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, id: &ResId) -> bool { self.index.contains_key(id) }

    pub fn find<P: Fn(&Resource) -> bool>(&self, pred: P) -> Option<&Resource> {
        self.iter().find(|r| pred(r))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.entries.iter().map(|(_, r)| r)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&ResId, &Resource)> + '_ {
        self.entries.iter().map(|(id, r)| (id, r))
    }

    pub fn ids(&self) -> Vec<ResId> {
        self.entries.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn into_resources(self) -> Vec<Resource> {
        self.entries.into_iter().map(|(_, r)| r).collect()
    }

    /// Append a resource; its id must not be present yet.
    pub fn insert(&mut self, res: Resource) -> Result<()> {
        let id = res.id();
        if self.index.contains_key(&id) {
            return Err(KiltError::DuplicateResource { id });
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, res));
        Ok(())
    }

    /// Collision-checked union. `other` is appended in its own order; existing order is kept.
    pub fn merge(&mut self, other: &ResMap) -> Result<()> {
        if let Some((id, _)) = other.entries.iter().find(|(id, _)| self.index.contains_key(id)) {
            return Err(KiltError::DuplicateResource { id: id.clone() });
        }
        for (id, res) in other.entries.iter() {
            self.index.insert(id.clone(), self.entries.len());
            self.entries.push((id.clone(), res.clone()));
        }
        Ok(())
    }

    /// Merge generator output, honoring each resource's behavior.
    ///
    /// `create`/`unspecified` append and fail on collisions. `merge` and `replace` require
    /// exactly one existing resource with the same kind and authored name (decorations and
    /// namespace are ignored, since the existing one may come from an already-decorated base).
    pub fn merge_generated(&mut self, other: ResMap) -> Result<()> {
        let mut next = self.clone();
        for (id, res) in other.entries {
            match res.behavior() {
                Behavior::Create | Behavior::Unspecified => next.insert(res)?,
                behavior @ (Behavior::Merge | Behavior::Replace) => {
                    let matches: Vec<usize> = next
                        .entries
                        .iter()
                        .enumerate()
                        .filter(|(_, (eid, _))| eid.gvk == id.gvk && eid.name == id.name)
                        .map(|(i, _)| i)
                        .collect();
                    let pos = match matches.as_slice() {
                        [one] => *one,
                        [] => return Err(KiltError::generator(&id.name, format!("behavior {} found no existing {} to combine with", behavior, id.gvk))),
                        _ => return Err(KiltError::generator(&id.name, format!("behavior {} matched {} existing resources", behavior, matches.len()))),
                    };
                    let existing = &mut next.entries[pos].1;
                    debug!(id = %id, %behavior, "combining generated resource with existing");
                    if behavior == Behavior::Merge { merge_payload(existing, &res); } else { replace_payload(existing, &res); }
                    existing.set_hash_eligible(existing.hash_eligible() || res.hash_eligible());
                }
            }
        }
        *self = next;
        Ok(())
    }

    /// Apply `f` to every resource, then recompute ids and re-check uniqueness.
    pub fn rewrite<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Resource) -> Result<()>,
    {
        let mut resources: Vec<Resource> = self.iter().cloned().collect();
        for r in resources.iter_mut() { f(r)?; }
        *self = Self::from_resources(resources)?;
        Ok(())
    }

    /// Apply `f` to the resource with `id`. Returns `Ok(false)` when absent.
    pub fn update<F>(&mut self, id: &ResId, f: F) -> Result<bool>
    where
        F: FnOnce(&mut Resource) -> Result<()>,
    {
        let Some(&pos) = self.index.get(id) else { return Ok(false) };
        let mut resources: Vec<Resource> = self.iter().cloned().collect();
        f(&mut resources[pos])?;
        *self = Self::from_resources(resources)?;
        Ok(true)
    }
}

const MERGED_MAPS: &[&[&str]] = &[
    &["data"],
    &["binaryData"],
    &["metadata", "labels"],
    &["metadata", "annotations"],
];

fn merge_payload(existing: &mut Resource, incoming: &Resource) {
    for path in MERGED_MAPS {
        let Some(src) = doc::get_path(incoming.doc(), path).and_then(|v| v.as_object()) else { continue };
        if let Some(dst) = doc::ensure_object(existing.doc_mut(), path) {
            for (k, v) in src { dst.insert(k.clone(), v.clone()); }
        }
    }
}

fn replace_payload(existing: &mut Resource, incoming: &Resource) {
    let name = existing.name().to_string();
    let namespace = existing.namespace().map(str::to_string);
    let mut next = incoming.doc().clone();
    doc::set_path(&mut next, &["metadata", "name"], Json::String(name));
    if let Some(ns) = namespace {
        doc::set_path(&mut next, &["metadata", "namespace"], Json::String(ns));
    }
    *existing.doc_mut() = next;
}
