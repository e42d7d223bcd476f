//! Render a built resource map as a YAML stream or a JSON list.

use std::cmp::Ordering;

use kilt_core::{ResMap, Resource};
use serde_json::{json, Value as Json};

/// Kinds emitted first under [`Reorder::Legacy`], in this order.
const FIRST_KINDS: &[&str] = &[
    "Namespace",
    "ResourceQuota",
    "StorageClass",
    "CustomResourceDefinition",
    "ServiceAccount",
    "PodSecurityPolicy",
    "Role",
    "ClusterRole",
    "RoleBinding",
    "ClusterRoleBinding",
    "ConfigMap",
    "Secret",
    "Endpoints",
    "Service",
    "LimitRange",
    "PriorityClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "Deployment",
    "StatefulSet",
    "CronJob",
    "PodDisruptionBudget",
];

/// Kinds emitted last under [`Reorder::Legacy`].
const LAST_KINDS: &[&str] = &["MutatingWebhookConfiguration", "ValidatingWebhookConfiguration"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reorder {
    /// Keep map order: bases first, then resources, then generated.
    #[default]
    None,
    /// Sort by a fixed kind order, then by kind, namespace and name.
    Legacy,
}

fn kind_rank(kind: &str) -> usize {
    if let Some(i) = FIRST_KINDS.iter().position(|k| *k == kind) { return i; }
    if let Some(i) = LAST_KINDS.iter().position(|k| *k == kind) { return FIRST_KINDS.len() + 1 + i; }
    FIRST_KINDS.len()
}

fn legacy_cmp(a: &Resource, b: &Resource) -> Ordering {
    kind_rank(a.kind())
        .cmp(&kind_rank(b.kind()))
        .then_with(|| a.gvk().cmp(&b.gvk()))
        .then_with(|| a.namespace().cmp(&b.namespace()))
        .then_with(|| a.name().cmp(b.name()))
}

pub fn ordered(m: &ResMap, reorder: Reorder) -> Vec<&Resource> {
    let mut out: Vec<&Resource> = m.iter().collect();
    if reorder == Reorder::Legacy {
        out.sort_by(|a, b| legacy_cmp(a, b));
    }
    out
}

/// YAML: documents separated by `---`. JSON: a `v1/List` with the documents as `items`.
pub fn render(m: &ResMap, format: OutputFormat, reorder: Reorder) -> Result<String, String> {
    let docs = ordered(m, reorder);
    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for (i, r) in docs.iter().enumerate() {
                if i > 0 { out.push_str("---\n"); }
                out.push_str(&serde_yaml::to_string(r.doc()).map_err(|e| e.to_string())?);
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let items: Vec<Json> = docs.iter().map(|r| r.doc().clone()).collect();
            serde_json::to_string_pretty(&json!({ "apiVersion": "v1", "kind": "List", "items": items })).map_err(|e| e.to_string())
        }
    }
}
