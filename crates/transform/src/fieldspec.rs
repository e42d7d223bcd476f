//! Field specs: where a string map (labels, selectors, annotations) lives in a given kind.
//!
//! A path segment of `[]` walks every element of an array.

use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec {
    /// `None` applies to every kind.
    pub kind: Option<&'static str>,
    pub path: &'static [&'static str],
    /// Create missing objects along the path.
    pub create: bool,
}

const fn spec(kind: &'static str, path: &'static [&'static str], create: bool) -> FieldSpec {
    FieldSpec { kind: Some(kind), path, create }
}

pub(crate) const LABEL_FIELDS: &[FieldSpec] = &[
    FieldSpec { kind: None, path: &["metadata", "labels"], create: true },
    spec("Service", &["spec", "selector"], true),
    spec("ReplicationController", &["spec", "selector"], true),
    spec("ReplicationController", &["spec", "template", "metadata", "labels"], true),
    spec("Deployment", &["spec", "selector", "matchLabels"], true),
    spec("Deployment", &["spec", "template", "metadata", "labels"], true),
    spec("ReplicaSet", &["spec", "selector", "matchLabels"], true),
    spec("ReplicaSet", &["spec", "template", "metadata", "labels"], true),
    spec("DaemonSet", &["spec", "selector", "matchLabels"], true),
    spec("DaemonSet", &["spec", "template", "metadata", "labels"], true),
    spec("StatefulSet", &["spec", "selector", "matchLabels"], true),
    spec("StatefulSet", &["spec", "template", "metadata", "labels"], true),
    spec("StatefulSet", &["spec", "volumeClaimTemplates", "[]", "metadata", "labels"], false),
    spec("Job", &["spec", "selector", "matchLabels"], false),
    spec("Job", &["spec", "template", "metadata", "labels"], true),
    spec("CronJob", &["spec", "jobTemplate", "metadata", "labels"], true),
    spec("CronJob", &["spec", "jobTemplate", "spec", "selector", "matchLabels"], false),
    spec("CronJob", &["spec", "jobTemplate", "spec", "template", "metadata", "labels"], true),
    spec("PodDisruptionBudget", &["spec", "selector", "matchLabels"], false),
    spec("NetworkPolicy", &["spec", "podSelector", "matchLabels"], false),
];

pub(crate) const ANNOTATION_FIELDS: &[FieldSpec] = &[
    FieldSpec { kind: None, path: &["metadata", "annotations"], create: true },
    spec("ReplicationController", &["spec", "template", "metadata", "annotations"], true),
    spec("Deployment", &["spec", "template", "metadata", "annotations"], true),
    spec("ReplicaSet", &["spec", "template", "metadata", "annotations"], true),
    spec("DaemonSet", &["spec", "template", "metadata", "annotations"], true),
    spec("StatefulSet", &["spec", "template", "metadata", "annotations"], true),
    spec("Job", &["spec", "template", "metadata", "annotations"], true),
    spec("CronJob", &["spec", "jobTemplate", "metadata", "annotations"], true),
    spec("CronJob", &["spec", "jobTemplate", "spec", "template", "metadata", "annotations"], true),
];

impl FieldSpec {
    pub fn applies_to(&self, kind: &str) -> bool {
        self.kind.map(|k| k == kind).unwrap_or(true)
    }

    /// Call `f` on every object this spec addresses in `doc`.
    pub fn visit(&self, doc: &mut Json, f: &mut dyn FnMut(&mut Map<String, Json>)) {
        walk(doc, self.path, self.create, f);
    }
}

fn walk(node: &mut Json, path: &[&str], create: bool, f: &mut dyn FnMut(&mut Map<String, Json>)) {
    if create && node.is_null() {
        *node = Json::Object(Map::new());
    }
    match path.split_first() {
        None => {
            if let Some(obj) = node.as_object_mut() { f(obj); }
        }
        Some((&"[]", rest)) => {
            if let Some(items) = node.as_array_mut() {
                for item in items { walk(item, rest, create, f); }
            }
        }
        Some((seg, rest)) => {
            let Some(obj) = node.as_object_mut() else { return };
            if !obj.contains_key(*seg) {
                if !create { return; }
                obj.insert(seg.to_string(), Json::Object(Map::new()));
            }
            if let Some(next) = obj.get_mut(*seg) { walk(next, rest, create, f); }
        }
    }
}
