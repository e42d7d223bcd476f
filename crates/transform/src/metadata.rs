//! `commonLabels` and `commonAnnotations`.

use std::collections::BTreeMap;

use kilt_core::{doc, ResMap, Result};

use crate::fieldspec::{FieldSpec, ANNOTATION_FIELDS, LABEL_FIELDS};
use crate::Transformer;

fn apply(m: &mut ResMap, entries: &BTreeMap<String, String>, fields: &[FieldSpec]) -> Result<()> {
    if entries.is_empty() { return Ok(()); }
    m.rewrite(|r| {
        let kind = r.kind().to_string();
        for fs in fields.iter().filter(|fs| fs.applies_to(&kind)) {
            fs.visit(r.doc_mut(), &mut |obj| doc::merge_string_map(obj, entries));
        }
        Ok(())
    })
}

/// Set-or-overwrite labels in metadata and in the selectors/templates of workload kinds.
#[derive(Debug, Clone, Default)]
pub struct LabelsTransformer {
    labels: BTreeMap<String, String>,
}

impl LabelsTransformer {
    pub fn new(labels: BTreeMap<String, String>) -> Self { Self { labels } }
}

impl Transformer for LabelsTransformer {
    fn name(&self) -> &'static str { "labels" }

    fn transform(&self, m: &mut ResMap) -> Result<()> { apply(m, &self.labels, LABEL_FIELDS) }
}

#[derive(Debug, Clone, Default)]
pub struct AnnotationsTransformer {
    annotations: BTreeMap<String, String>,
}

impl AnnotationsTransformer {
    pub fn new(annotations: BTreeMap<String, String>) -> Self { Self { annotations } }
}

impl Transformer for AnnotationsTransformer {
    fn name(&self) -> &'static str { "annotations" }

    fn transform(&self, m: &mut ResMap) -> Result<()> { apply(m, &self.annotations, ANNOTATION_FIELDS) }
}
