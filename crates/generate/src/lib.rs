//! Kilt generators: synthesize ConfigMaps and Secrets from literals, files, env files
//! and (Secrets only) command output.

#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use kilt_core::{doc, Behavior, KiltError, ResMap, Resource, Result};
use kilt_loader::Loader;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tracing::{debug, info};

pub mod exec;
pub mod kv;

pub const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// One `configMapGenerator` / `secretGenerator` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneratorArgs {
    pub name: String,
    /// `create` (default), `merge` or `replace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior: Option<Behavior>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub literals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<String>,
    /// Single env file; read after `envs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Shell command per key. Secrets only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    /// Per-command deadline; 0 waits indefinitely.
    #[serde(default)]
    pub timeout_seconds: u64,
}

/// `generatorOptions` of a kustomization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct GeneratorOptions {
    pub disable_name_suffix_hash: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedKind {
    ConfigMap,
    Secret,
}

impl GeneratedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
        }
    }
}

/// Run every ConfigMap generator, then every Secret generator, in declaration order.
pub fn generate_all(
    ldr: &dyn Loader,
    config_maps: &[GeneratorArgs],
    secrets: &[GeneratorArgs],
    opts: &GeneratorOptions,
) -> Result<ResMap> {
    let mut out = ResMap::new();
    let specs = config_maps
        .iter()
        .map(|a| (a, GeneratedKind::ConfigMap))
        .chain(secrets.iter().map(|a| (a, GeneratedKind::Secret)));
    for (args, kind) in specs {
        out.insert(generate(ldr, args, kind, opts)?)?;
    }
    if !out.is_empty() {
        info!(root = %ldr.root().display(), count = out.len(), "generated resources");
    }
    Ok(out)
}

/// Build one ConfigMap or Secret from `args`.
pub fn generate(ldr: &dyn Loader, args: &GeneratorArgs, kind: GeneratedKind, opts: &GeneratorOptions) -> Result<Resource> {
    let fail = |reason: String| KiltError::generator(&args.name, reason);
    if args.name.is_empty() {
        return Err(KiltError::generator("<unnamed>", format!("{} generator requires a name", kind.as_str())));
    }
    if kind == GeneratedKind::ConfigMap && !args.commands.is_empty() {
        return Err(fail("commands are only supported by secret generators".into()));
    }

    let mut pairs: Vec<(String, Vec<u8>)> = Vec::new();
    for lit in &args.literals {
        let (k, v) = kv::parse_literal(lit).map_err(|e| fail(e.to_string()))?;
        pairs.push((k, v.into_bytes()));
    }
    for path in args.envs.iter().chain(args.env.iter()) {
        let content = ldr.load(path)?;
        let entries = kv::parse_env(&content, |k| std::env::var(k).ok()).map_err(|e| fail(format!("{}: {}", path, e)))?;
        pairs.extend(entries.into_iter().map(|(k, v)| (k, v.into_bytes())));
    }
    for src in &args.files {
        let (k, path) = kv::parse_file_source(src).map_err(|e| fail(e.to_string()))?;
        pairs.push((k, ldr.load(&path)?));
    }
    let timeout = (args.timeout_seconds > 0).then(|| Duration::from_secs(args.timeout_seconds));
    for (k, command) in &args.commands {
        let out = exec::run(command, ldr.root(), timeout).map_err(|e| fail(format!("command for key {}: {}", k, e)))?;
        pairs.push((k.clone(), trim_newline(out)));
    }

    let mut seen = BTreeSet::new();
    for (k, _) in &pairs {
        kv::validate_key(k).map_err(|e| fail(e.to_string()))?;
        if !seen.insert(k.as_str()) {
            return Err(fail(format!("duplicate key {:?}", k)));
        }
    }

    let mut d = json!({
        "apiVersion": "v1",
        "kind": kind.as_str(),
        "metadata": { "name": args.name },
    });
    if !opts.labels.is_empty() {
        if let Some(labels) = doc::ensure_object(&mut d, &["metadata", "labels"]) { doc::merge_string_map(labels, &opts.labels); }
    }
    if !opts.annotations.is_empty() {
        if let Some(annos) = doc::ensure_object(&mut d, &["metadata", "annotations"]) { doc::merge_string_map(annos, &opts.annotations); }
    }
    match kind {
        GeneratedKind::ConfigMap => {
            let mut data = Map::new();
            let mut binary = Map::new();
            for (k, v) in pairs {
                match String::from_utf8(v) {
                    Ok(s) => { data.insert(k, Json::String(s)); }
                    Err(e) => { binary.insert(k, Json::String(BASE64.encode(e.as_bytes()))); }
                }
            }
            d["data"] = Json::Object(data);
            if !binary.is_empty() { d["binaryData"] = Json::Object(binary); }
        }
        GeneratedKind::Secret => {
            let data: Map<String, Json> = pairs.into_iter().map(|(k, v)| (k, Json::String(BASE64.encode(v)))).collect();
            d["type"] = Json::String(args.secret_type.clone().unwrap_or_else(|| SECRET_TYPE_OPAQUE.to_string()));
            d["data"] = Json::Object(data);
        }
    }

    let res = Resource::from_value(d)
        .map_err(|e| fail(e.to_string()))?
        .with_behavior(args.behavior.unwrap_or(Behavior::Create))
        .with_hash_eligible(!opts.disable_name_suffix_hash);
    debug!(name = %args.name, kind = kind.as_str(), behavior = %res.behavior(), "generated resource");
    Ok(res)
}

fn trim_newline(mut out: Vec<u8>) -> Vec<u8> {
    if out.last() == Some(&b'\n') {
        out.pop();
        if out.last() == Some(&b'\r') { out.pop(); }
    }
    out
}
