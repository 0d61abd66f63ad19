//! Addon manifests (`addon.json`)

use pv_core::PvError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "addon.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} has an empty name")]
    EmptyName { path: PathBuf },
}

impl ManifestError {
    /// Convert into a [`PvError`] attributed to `addon`.
    pub fn into_pv_error(self, addon: &str) -> PvError {
        PvError::invalid_manifest(addon, self.to_string())
    }
}

fn enabled_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonManifest {
    pub name: String,
    /// Catalog entry to call; defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

impl AddonManifest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entry: None, description: None, version: None, enabled: true }
    }

    pub fn entry(&self) -> &str {
        self.entry.as_deref().unwrap_or(&self.name)
    }

    /// Read `addon.json` from an addon directory. `Ok(None)` if the
    /// directory has no manifest.
    pub fn load(dir: &Path) -> Result<Option<Self>, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read { path: path.clone(), source })?;
        let manifest: Self =
            serde_json::from_str(&text).map_err(|source| ManifestError::Parse { path: path.clone(), source })?;
        if manifest.name.trim().is_empty() {
            return Err(ManifestError::EmptyName { path });
        }
        Ok(Some(manifest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addon_dir(name: &str, manifest: Option<&str>) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pv-manifest-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(text) = manifest {
            std::fs::write(dir.join(MANIFEST_FILE), text).unwrap();
        }
        dir
    }

    #[test]
    fn test_minimal_manifest() {
        let dir = addon_dir("minimal", Some(r#"{"name": "pitch"}"#));
        let manifest = AddonManifest::load(&dir).unwrap().unwrap();
        assert_eq!(manifest, AddonManifest::new("pitch"));
        assert_eq!(manifest.entry(), "pitch");
        assert!(manifest.enabled);
    }

    #[test]
    fn test_full_manifest() {
        let dir = addon_dir(
            "full",
            Some(r#"{"name": "fx", "entry": "smoke", "description": "Smoke", "version": "1.2", "enabled": false}"#),
        );
        let manifest = AddonManifest::load(&dir).unwrap().unwrap();
        assert_eq!(manifest.entry(), "smoke");
        assert_eq!(manifest.version.as_deref(), Some("1.2"));
        assert!(!manifest.enabled);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = addon_dir("none", None);
        assert!(AddonManifest::load(&dir).unwrap().is_none());
    }

    #[test]
    fn test_bad_manifests() {
        let dir = addon_dir("garbage", Some("name = pitch"));
        let err = AddonManifest::load(&dir).unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        let err = err.into_pv_error("garbage");
        assert_eq!(err.code, pv_core::codes::INVALID_MANIFEST);

        let dir = addon_dir("blank", Some(r#"{"name": "  "}"#));
        assert!(matches!(AddonManifest::load(&dir).unwrap_err(), ManifestError::EmptyName { .. }));
    }
}
