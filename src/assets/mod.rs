//! Bundled Manifests
//!
//! Every manifest the operator applies is compiled into the binary from the
//! `assets/` directory. Templates carry `${NAME}` placeholders that are
//! filled in by [`render`] before the manifest is parsed.

use crate::error::{Error, Result};
use kube::api::DynamicObject;
use std::collections::BTreeMap;

macro_rules! bundled {
    ($($name:literal),* $(,)?) => {
        &[$(($name, include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/", $name)))),*]
    };
}

static ASSETS: &[(&str, &str)] = bundled![
    "configmap.yaml",
    "storageclass.yaml",
    "csidriver.yaml",
    "controller_sa.yaml",
    "node_sa.yaml",
    "rbac/attacher_role.yaml",
    "rbac/attacher_binding.yaml",
    "rbac/privileged_role.yaml",
    "rbac/controller_privileged_binding.yaml",
    "rbac/node_privileged_binding.yaml",
    "rbac/provisioner_role.yaml",
    "rbac/provisioner_binding.yaml",
    "rbac/resizer_role.yaml",
    "rbac/resizer_binding.yaml",
    "rbac/snapshotter_role.yaml",
    "rbac/snapshotter_binding.yaml",
    "controller.yaml",
    "node.yaml",
];

/// Signature of an asset lookup handed to the controllers
pub type AssetFn = fn(&str) -> Result<&'static str>;

/// Look up a bundled manifest by its path relative to `assets/`
pub fn asset(name: &str) -> Result<&'static str> {
    ASSETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, content)| *content)
        .ok_or_else(|| Error::AssetNotFound {
            name: name.to_string(),
        })
}

/// Names of all bundled manifests
pub fn asset_names() -> impl Iterator<Item = &'static str> {
    ASSETS.iter().map(|(name, _)| *name)
}

/// Substitute `${KEY}` placeholders in a template
///
/// Fails if any placeholder is left once all known keys are replaced.
pub fn render(asset_name: &str, template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut rendered = template.to_string();
    for (key, value) in vars {
        rendered = rendered.replace(&format!("${{{}}}", key), value);
    }

    if let Some(start) = rendered.find("${") {
        let placeholder = rendered[start..]
            .split_once('}')
            .map(|(head, _)| format!("{}}}", head))
            .unwrap_or_else(|| rendered[start..].to_string());
        return Err(Error::UnresolvedPlaceholder {
            asset: asset_name.to_string(),
            placeholder,
        });
    }

    Ok(rendered)
}

/// Parse a rendered manifest into an untyped object
///
/// The manifest must carry `apiVersion`, `kind` and `metadata.name`.
pub fn parse_manifest(asset_name: &str, rendered: &str) -> Result<DynamicObject> {
    let value: serde_json::Value = serde_yaml::from_str(rendered)?;
    let object: DynamicObject = serde_json::from_value(value)?;

    if object.types.is_none() {
        return Err(Error::InvalidManifest {
            asset: asset_name.to_string(),
            reason: "missing apiVersion or kind".to_string(),
        });
    }
    if object.metadata.name.is_none() {
        return Err(Error::InvalidManifest {
            asset: asset_name.to_string(),
            reason: "missing metadata.name".to_string(),
        });
    }

    Ok(object)
}

/// Look up, render and parse a bundled manifest in one step
pub fn load_manifest(
    asset_fn: AssetFn,
    name: &str,
    vars: &BTreeMap<String, String>,
) -> Result<DynamicObject> {
    let template = asset_fn(name)?;
    let rendered = render(name, template, vars)?;
    parse_manifest(name, &rendered)
}
