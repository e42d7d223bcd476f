//! Name decoration: `namePrefix`/`nameSuffix` per level, content-hash suffix at the root.

use kilt_core::{hash, ResMap, Result};
use tracing::debug;

use crate::Transformer;

#[derive(Debug, Clone, Default)]
pub struct PrefixSuffixTransformer {
    prefix: String,
    suffix: String,
}

impl PrefixSuffixTransformer {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), suffix: suffix.into() }
    }
}

impl Transformer for PrefixSuffixTransformer {
    fn name(&self) -> &'static str { "prefix-suffix" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        if self.prefix.is_empty() && self.suffix.is_empty() { return Ok(()); }
        m.rewrite(|r| {
            r.decorate_name(&self.prefix, &self.suffix);
            Ok(())
        })
    }
}

/// Append `-<hash>` to every hash-eligible resource. Identity is unaffected.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHashTransformer;

impl Transformer for NameHashTransformer {
    fn name(&self) -> &'static str { "name-hash" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        m.rewrite(|r| {
            if r.hash_eligible() {
                let hashed = format!("{}-{}", r.name(), hash::content_hash(r));
                debug!(id = %r.id(), name = %hashed, "hash suffix applied");
                r.set_name(&hashed);
                r.set_hash_eligible(false);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kilt_core::Resource;
    use serde_json::json;

    fn res(kind: &str, name: &str) -> Resource {
        Resource::from_value(json!({ "apiVersion": "v1", "kind": kind, "metadata": { "name": name }, "data": {} })).unwrap()
    }

    #[test]
    fn prefix_and_suffix_accumulate_in_ids() {
        let mut m = ResMap::from_resources(vec![res("ConfigMap", "cm")]).unwrap();
        PrefixSuffixTransformer::new("base-", "-b").transform(&mut m).unwrap();
        PrefixSuffixTransformer::new("top-", "").transform(&mut m).unwrap();
        let (id, r) = m.entries().next().unwrap();
        assert_eq!(r.name(), "top-base-cm-b");
        assert_eq!((id.prefix.as_str(), id.name.as_str(), id.suffix.as_str()), ("top-base-", "cm", "-b"));
    }

    #[test]
    fn decoration_never_merges_distinct_ids() {
        // "a-" + "b" and "a" + "-b" both render as "a-b" but stay distinct.
        let mut one = res("ConfigMap", "b");
        one.decorate_name("a-", "");
        let mut two = res("ConfigMap", "a");
        two.decorate_name("", "-b");
        let mut m = ResMap::from_resources(vec![one, two]).unwrap();
        PrefixSuffixTransformer::new("x-", "").transform(&mut m).unwrap();
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn hash_only_touches_eligible_resources() {
        let gen = Resource::from_value(json!({
            "apiVersion": "v1", "kind": "ConfigMap",
            "metadata": { "name": "literalConfigMap" },
            "data": { "DB_USERNAME": "admin", "DB_PASSWORD": "somepw" }
        }))
        .unwrap()
        .with_hash_eligible(true);
        let mut m = ResMap::from_resources(vec![gen, res("Service", "svc")]).unwrap();
        PrefixSuffixTransformer::new("foo-", "-bar").transform(&mut m).unwrap();
        NameHashTransformer.transform(&mut m).unwrap();
        let names: Vec<&str> = m.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["foo-literalConfigMap-bar-8d2dkb8k24", "foo-svc-bar"]);
        assert_eq!(m.ids()[0].decorated_name(), "foo-literalConfigMap-bar");
        assert!(!m.iter().any(|r| r.hash_eligible()));
    }
}
