//! The `kustomization.yaml` schema.

use std::collections::BTreeMap;

use kilt_core::{KiltError, Result};
use kilt_generate::{GeneratorArgs, GeneratorOptions};
use kilt_loader::Loader;
use kilt_transform::{ImageSpec, PatchTarget};
use serde::{Deserialize, Serialize};

/// File names tried, in order, in every kustomization directory.
pub const KUSTOMIZATION_FILE_NAMES: &[&str] = &["kustomization.yaml", "kustomization.yml"];

/// One directory's declarative build description. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Kustomization {
    /// Accepted and ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Accepted and ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name_prefix: String,
    pub name_suffix: String,
    pub namespace: String,
    pub common_labels: BTreeMap<String, String>,
    pub common_annotations: BTreeMap<String, String>,
    pub resources: Vec<String>,
    pub bases: Vec<String>,
    pub config_map_generator: Vec<GeneratorArgs>,
    pub secret_generator: Vec<GeneratorArgs>,
    pub patches_json6902: Vec<PatchSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_options: Option<GeneratorOptions>,
    pub images: Vec<ImageSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchSpec {
    pub target: PatchTarget,
    /// Patch file, relative to the kustomization directory.
    pub path: String,
}

impl Kustomization {
    /// Parse a kustomization document. `path` is only used for error messages.
    pub fn from_bytes(path: &str, bytes: &[u8]) -> Result<Self> {
        let blank = String::from_utf8_lossy(bytes).lines().map(str::trim).all(|l| l.is_empty() || l.starts_with('#'));
        if blank {
            return Ok(Self::default());
        }
        let k: Option<Self> = serde_yaml::from_slice(bytes).map_err(|e| KiltError::config(path, e.to_string()))?;
        Ok(k.unwrap_or_default())
    }

    /// Find and parse the kustomization file at the loader's root.
    pub fn load(ldr: &dyn Loader) -> Result<Self> {
        let Some(name) = KUSTOMIZATION_FILE_NAMES.iter().find(|n| ldr.is_file(n)) else {
            return Err(KiltError::config(
                ldr.root().display().to_string(),
                format!("missing {} in directory", KUSTOMIZATION_FILE_NAMES[0]),
            ));
        };
        let bytes = ldr.load(name)?;
        Self::from_bytes(&ldr.resolve(name).display().to_string(), &bytes)
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        self.generator_options.clone().unwrap_or_default()
    }
}
