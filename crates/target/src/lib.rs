//! Kilt target: build one kustomization directory into a resource map.
//!
//! A build resolves bases recursively (each into its own map, merged in declaration
//! order), adds local resources and generator output, then runs the per-level
//! transformer pipeline. The root additionally applies content-hash name suffixes
//! and rewrites ConfigMap/Secret references to the final names.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::time::Instant;

use kilt_core::{parse, KiltError, ResMap, Result};
use kilt_generate::{generate_all, GeneratorOptions};
use kilt_loader::Loader;
use kilt_transform::{
    AnnotationsTransformer, ImagesTransformer, LabelsTransformer, NameHashTransformer, NameReferenceTransformer,
    NamespaceTransformer, PatchTransformer, Pipeline, PrefixSuffixTransformer, Transformer,
};
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

pub mod kustomization;
pub mod output;

pub use kustomization::{Kustomization, PatchSpec, KUSTOMIZATION_FILE_NAMES};
pub use output::{render, OutputFormat, Reorder};

/// Per-build settings, independent of the loaded kustomization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Replaces the root kustomization's `generatorOptions` for this build.
    pub generator_options: Option<GeneratorOptions>,
}

impl BuildOptions {
    /// Force the hash-suffix pass on or off, keeping the root's generator labels/annotations.
    pub fn with_disable_name_suffix_hash(mut self, root: &Kustomization, disable: bool) -> Self {
        let mut opts = self.generator_options.take().unwrap_or_else(|| root.generator_options());
        opts.disable_name_suffix_hash = disable;
        self.generator_options = Some(opts);
        self
    }
}

/// One kustomization directory, loaded and ready to build.
pub struct KustTarget {
    ldr: Box<dyn Loader>,
    kustomization: Kustomization,
}

impl KustTarget {
    pub fn new(ldr: Box<dyn Loader>) -> Result<Self> {
        let kustomization = Kustomization::load(ldr.as_ref())?;
        Ok(Self { ldr, kustomization })
    }

    pub fn kustomization(&self) -> &Kustomization { &self.kustomization }

    pub fn root(&self) -> &Path { self.ldr.root() }

    /// Build with the kustomization's own options.
    pub fn make_customized_res_map(&self) -> Result<ResMap> { self.build(&BuildOptions::default()) }

    /// Build the final resource map. Nothing partial is returned on error.
    pub fn build(&self, opts: &BuildOptions) -> Result<ResMap> {
        let t0 = Instant::now();
        counter!("build_attempts", 1u64);
        info!(root = %self.root().display(), "build started");
        match self.build_root(opts) {
            Ok(m) => {
                histogram!("build_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
                counter!("build_ok", 1u64);
                info!(root = %self.root().display(), resources = m.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "build finished");
                Ok(m)
            }
            Err(e) => {
                counter!("build_err", 1u64);
                warn!(root = %self.root().display(), kind = e.kind(), error = %e, "build failed");
                Err(e)
            }
        }
    }

    fn build_root(&self, opts: &BuildOptions) -> Result<ResMap> {
        let gen_opts = opts.generator_options.clone().unwrap_or_else(|| self.kustomization.generator_options());
        let mut stack = Vec::new();
        let mut m = self.accumulate(&mut stack, &gen_opts)?;
        // Eligibility was fixed per level at generation time.
        NameHashTransformer.transform(&mut m)?;
        NameReferenceTransformer.transform(&mut m)?;
        Ok(m)
    }

    /// Build this level: bases, resources, generators, then the level's transformers.
    /// `stack` holds the canonical roots currently being built, outermost first.
    fn accumulate(&self, stack: &mut Vec<PathBuf>, gen_opts: &GeneratorOptions) -> Result<ResMap> {
        let root = self.root().to_path_buf();
        if stack.iter().any(|p| p == &root) {
            return Err(KiltError::Cycle { path: root.display().to_string() });
        }
        stack.push(root);
        let result = self.accumulate_level(stack, gen_opts);
        stack.pop();
        result
    }

    fn accumulate_level(&self, stack: &mut Vec<PathBuf>, gen_opts: &GeneratorOptions) -> Result<ResMap> {
        let k = &self.kustomization;
        let mut acc = ResMap::new();

        for base in &k.bases {
            let child = KustTarget::new(self.ldr.new_loader(base)?)?;
            debug!(base = %child.root().display(), parent = %self.root().display(), "resolving base");
            let child_opts = child.kustomization.generator_options();
            let m = child.accumulate(stack, &child_opts)?;
            acc.merge(&m)?;
        }

        for path in &k.resources {
            let bytes = self.ldr.load(path)?;
            let resolved = self.ldr.resolve(path).display().to_string();
            let loaded = ResMap::from_resources(parse::resources_from_bytes(&resolved, &bytes)?)?;
            debug!(file = %resolved, count = loaded.len(), "loaded resources");
            acc.merge(&loaded)?;
        }

        let generated = generate_all(self.ldr.as_ref(), &k.config_map_generator, &k.secret_generator, gen_opts)?;
        acc.merge_generated(generated)?;

        self.pipeline()?.transform(&mut acc)?;
        debug!(root = %self.root().display(), resources = acc.len(), "level accumulated");
        Ok(acc)
    }

    fn pipeline(&self) -> Result<Pipeline> {
        let k = &self.kustomization;
        let mut p = Pipeline::new();
        for spec in &k.patches_json6902 {
            let bytes = self.ldr.load(&spec.path)?;
            let resolved = self.ldr.resolve(&spec.path).display().to_string();
            p.push(PatchTransformer::from_bytes(resolved, spec.target.clone(), &bytes)?);
        }
        p.push(LabelsTransformer::new(k.common_labels.clone()));
        p.push(AnnotationsTransformer::new(k.common_annotations.clone()));
        p.push(PrefixSuffixTransformer::new(k.name_prefix.as_str(), k.name_suffix.as_str()));
        p.push(NamespaceTransformer::new(k.namespace.as_str()));
        p.push(ImagesTransformer::new(k.images.clone()));
        Ok(p)
    }
}

/// Build the kustomization at `ldr`'s root with default options.
pub fn build(ldr: Box<dyn Loader>) -> Result<ResMap> {
    KustTarget::new(ldr)?.make_customized_res_map()
}
