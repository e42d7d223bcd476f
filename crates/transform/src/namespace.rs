//! `namespace`: set `metadata.namespace` on every namespaced resource.

use kilt_core::{ResMap, Result};

use crate::Transformer;

#[derive(Debug, Clone)]
pub struct NamespaceTransformer {
    namespace: String,
}

impl NamespaceTransformer {
    pub fn new(namespace: impl Into<String>) -> Self { Self { namespace: namespace.into() } }
}

impl Transformer for NamespaceTransformer {
    fn name(&self) -> &'static str { "namespace" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        if self.namespace.is_empty() { return Ok(()); }
        m.rewrite(|r| {
            if !r.gvk().is_cluster_scoped() {
                r.set_namespace(&self.namespace);
            }
            Ok(())
        })
    }
}
