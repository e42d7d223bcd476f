//! Kilt core: resource identities, resources and the collision-checked resource map.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub mod doc;
pub mod error;
pub mod hash;
pub mod parse;
pub mod resmap;

pub use error::{DocError, KiltError, Result};
pub use resmap::ResMap;

/// Kinds that never carry `metadata.namespace`.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "CertificateSigningRequest",
    "ClusterRole",
    "ClusterRoleBinding",
    "ComponentStatus",
    "CSIDriver",
    "CSINode",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PodSecurityPolicy",
    "PriorityClass",
    "RuntimeClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { group: group.into(), version: version.into(), kind: kind.into() }
    }

    /// Split an `apiVersion` (`group/version` or bare `version`) and pair it with `kind`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version.to_string()),
        };
        Self { group, version, kind: kind.to_string() }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() { self.version.clone() } else { format!("{}/{}", self.group, self.version) }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        CLUSTER_SCOPED_KINDS.contains(&self.kind.as_str())
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() { write!(f, "{}/{}", self.version, self.kind) } else { write!(f, "{}/{}/{}", self.group, self.version, self.kind) }
    }
}

/// Identity of a resource inside a [`ResMap`].
///
/// `name` is the name as authored; `prefix`/`suffix` accumulate every name decoration
/// applied on the way up the base chain. The content-hash suffix is not part of the id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResId {
    pub gvk: Gvk,
    pub name: String,
    /// Empty for cluster-scoped resources.
    pub namespace: String,
    pub prefix: String,
    pub suffix: String,
}

impl ResId {
    pub fn new(gvk: Gvk, name: impl Into<String>) -> Self {
        Self { gvk, name: name.into(), ..Default::default() }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_prefix_suffix(mut self, prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self.suffix = suffix.into();
        self
    }

    pub fn decorated_name(&self) -> String {
        format!("{}{}{}", self.prefix, self.name, self.suffix)
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.namespace.is_empty() { "-" } else { self.namespace.as_str() };
        write!(f, "{} {}/{}", self.gvk, ns, self.name)?;
        if !self.prefix.is_empty() || !self.suffix.is_empty() {
            write!(f, " (prefix={:?}, suffix={:?})", self.prefix, self.suffix)?;
        }
        Ok(())
    }
}

/// How a resource combines with an existing resource of the same identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    #[default]
    Unspecified,
    Create,
    Merge,
    Replace,
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unspecified => "unspecified",
            Self::Create => "create",
            Self::Merge => "merge",
            Self::Replace => "replace",
        };
        f.write_str(s)
    }
}

/// A single document plus the bookkeeping needed to compute its [`ResId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    doc: Json,
    behavior: Behavior,
    original_name: String,
    prefix: String,
    suffix: String,
    hash_eligible: bool,
}

impl Resource {
    /// Wrap a document, requiring `apiVersion`, `kind` and `metadata.name`.
    pub fn from_value(doc: Json) -> std::result::Result<Self, DocError> {
        if !doc.is_object() { return Err(DocError::NotMapping); }
        match doc.get("apiVersion").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(DocError::MissingApiVersion),
        }
        match doc.get("kind").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(DocError::MissingKind),
        }
        let name = match doc::get_str(&doc, &["metadata", "name"]) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => return Err(DocError::MissingName),
        };
        Ok(Self {
            doc,
            behavior: Behavior::Unspecified,
            original_name: name,
            prefix: String::new(),
            suffix: String::new(),
            hash_eligible: false,
        })
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_hash_eligible(mut self, eligible: bool) -> Self {
        self.hash_eligible = eligible;
        self
    }

    pub fn id(&self) -> ResId {
        ResId {
            gvk: self.gvk(),
            name: self.original_name.clone(),
            namespace: self.namespace().unwrap_or_default().to_string(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
        }
    }

    pub fn gvk(&self) -> Gvk {
        let api_version = self.doc.get("apiVersion").and_then(|v| v.as_str()).unwrap_or("");
        let kind = self.doc.get("kind").and_then(|v| v.as_str()).unwrap_or("");
        Gvk::from_api_version(api_version, kind)
    }

    pub fn kind(&self) -> &str {
        self.doc.get("kind").and_then(|v| v.as_str()).unwrap_or("")
    }

    /// Current `metadata.name`, including any decoration and hash suffix.
    pub fn name(&self) -> &str {
        doc::get_str(&self.doc, &["metadata", "name"]).unwrap_or("")
    }

    pub fn set_name(&mut self, name: &str) {
        doc::set_path(&mut self.doc, &["metadata", "name"], Json::String(name.to_string()));
    }

    pub fn original_name(&self) -> &str { &self.original_name }

    pub fn namespace(&self) -> Option<&str> {
        doc::get_str(&self.doc, &["metadata", "namespace"]).filter(|s| !s.is_empty())
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        doc::set_path(&mut self.doc, &["metadata", "namespace"], Json::String(namespace.to_string()));
    }

    /// Apply `prefix + name + suffix` and record the decoration in the identity.
    pub fn decorate_name(&mut self, prefix: &str, suffix: &str) {
        if prefix.is_empty() && suffix.is_empty() { return; }
        let name = format!("{}{}{}", prefix, self.name(), suffix);
        self.set_name(&name);
        self.prefix = format!("{}{}", prefix, self.prefix);
        self.suffix.push_str(suffix);
    }

    pub fn behavior(&self) -> Behavior { self.behavior }

    pub fn set_behavior(&mut self, behavior: Behavior) { self.behavior = behavior; }

    /// Generated resources receive a content-hash name suffix at the end of the build.
    pub fn hash_eligible(&self) -> bool { self.hash_eligible }

    pub fn set_hash_eligible(&mut self, eligible: bool) { self.hash_eligible = eligible; }

    pub fn doc(&self) -> &Json { &self.doc }

    /// Mutable payload access. Identity changes made through this are picked up
    /// when the owning map recomputes ids.
    pub fn doc_mut(&mut self) -> &mut Json { &mut self.doc }

    pub fn into_doc(self) -> Json { self.doc }
}
