//! Kilt transformers: whole-map rewrites applied once per kustomization level.
//!
//! The per-level [`Pipeline`] runs patch, labels/annotations, name prefix/suffix,
//! namespace and images, in that order.
//! The hash-suffix and name-reference passes run once, at the root.

#![forbid(unsafe_code)]

use kilt_core::{ResMap, Result};
use tracing::debug;

mod fieldspec;
pub mod images;
pub mod metadata;
pub mod name;
pub mod namespace;
pub mod nameref;
pub mod patch;

pub use images::{ImageSpec, ImagesTransformer};
pub use metadata::{AnnotationsTransformer, LabelsTransformer};
pub use name::{NameHashTransformer, PrefixSuffixTransformer};
pub use namespace::NamespaceTransformer;
pub use nameref::NameReferenceTransformer;
pub use patch::{JsonPatch, PatchOp, PatchTarget, PatchTransformer};

/// A rewrite of a whole resource map. Implementations that change identity fields
/// go through [`ResMap::rewrite`] so collisions are re-checked.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;
    fn transform(&self, m: &mut ResMap) -> Result<()>;
}

/// Ordered list of transformers; stops at the first error.
#[derive(Default)]
pub struct Pipeline {
    steps: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, t: impl Transformer + 'static) -> &mut Self {
        self.steps.push(Box::new(t));
        self
    }

    pub fn len(&self) -> usize { self.steps.len() }
    pub fn is_empty(&self) -> bool { self.steps.is_empty() }

    pub fn names(&self) -> Vec<&'static str> { self.steps.iter().map(|t| t.name()).collect() }
}

impl Transformer for Pipeline {
    fn name(&self) -> &'static str { "pipeline" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        for step in &self.steps {
            debug!(step = step.name(), resources = m.len(), "applying transformer");
            step.transform(m)?;
        }
        Ok(())
    }
}
