//! `images`: rewrite container image names, tags and digests.

use kilt_core::{ResMap, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::Transformer;

const CONTAINER_LISTS: &[&str] = &["containers", "initContainers"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageSpec {
    /// Image name to match, without tag or digest.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tag: Option<String>,
    /// Takes precedence over `new_tag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl ImageSpec {
    /// The replacement for `image`, or `None` when the name does not match.
    fn rewrite(&self, image: &str) -> Option<String> {
        let (name, reference) = split_image(image);
        if name != self.name { return None; }
        let name = self.new_name.as_deref().unwrap_or(name);
        let reference = match (&self.digest, &self.new_tag) {
            (Some(d), _) => format!("@{}", d),
            (None, Some(t)) => format!(":{}", t),
            (None, None) => reference.to_string(),
        };
        Some(format!("{}{}", name, reference))
    }
}

/// Split `image` into its name and the `:tag` / `@digest` part (separator included).
fn split_image(image: &str) -> (&str, &str) {
    if let Some(i) = image.find('@') {
        return image.split_at(i);
    }
    let last_slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_slash..].rfind(':') {
        Some(i) => image.split_at(last_slash + i),
        None => (image, ""),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImagesTransformer {
    images: Vec<ImageSpec>,
}

impl ImagesTransformer {
    pub fn new(images: Vec<ImageSpec>) -> Self { Self { images } }
}

impl Transformer for ImagesTransformer {
    fn name(&self) -> &'static str { "images" }

    fn transform(&self, m: &mut ResMap) -> Result<()> {
        if self.images.is_empty() { return Ok(()); }
        m.rewrite(|r| {
            let mut changed = 0usize;
            walk(r.doc_mut(), &self.images, &mut changed);
            if changed > 0 { debug!(id = %r.id(), changed, "images updated"); }
            Ok(())
        })
    }
}

fn walk(node: &mut Json, images: &[ImageSpec], changed: &mut usize) {
    match node {
        Json::Object(obj) => {
            for (key, value) in obj.iter_mut() {
                if CONTAINER_LISTS.contains(&key.as_str()) {
                    if let Some(containers) = value.as_array_mut() {
                        for c in containers.iter_mut() { update_container(c, images, changed); }
                        continue;
                    }
                }
                walk(value, images, changed);
            }
        }
        Json::Array(items) => {
            for item in items { walk(item, images, changed); }
        }
        _ => {}
    }
}

fn update_container(container: &mut Json, images: &[ImageSpec], changed: &mut usize) {
    let Some(slot) = container.get_mut("image") else { return };
    let Some(current) = slot.as_str() else { return };
    if let Some(next) = images.iter().find_map(|spec| spec.rewrite(current)) {
        *slot = Json::String(next);
        *changed += 1;
    }
}
