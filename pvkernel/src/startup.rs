//! Addon loading
//!
//! Every configured directory is listed in sorted order. Each entry names an
//! addon (its file name up to the first `.`); a directory entry may carry an
//! `addon.json` manifest. The addon's entry is looked up in the
//! [`AddonCatalog`] and called with the registry.
//!
//! A failing addon never stops the scan: its error is logged and recorded in
//! the [`AddonReport`], and loading moves on to the next entry.

use crate::manifest::AddonManifest;
use pv_core::PvError;
use pv_plugin::{AddonCatalog, PluginRegistry};
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory entries that never hold an addon
const IGNORED: [&str; 2] = ["__pycache__", "target"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedAddon {
    pub name: String,
    /// Catalog entry that was called
    pub entry: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAddon {
    pub name: String,
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddonFailure {
    pub addon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub error: PvError,
}

/// Outcome of one loading pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddonReport {
    pub loaded: Vec<LoadedAddon>,
    pub skipped: Vec<SkippedAddon>,
    pub failures: Vec<AddonFailure>,
}

impl AddonReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn loaded_names(&self) -> Vec<&str> {
        self.loaded.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn merge(&mut self, other: AddonReport) {
        self.loaded.extend(other.loaded);
        self.skipped.extend(other.skipped);
        self.failures.extend(other.failures);
    }

    fn fail(&mut self, addon: &str, path: Option<&Path>, error: PvError) {
        warn!(
            addon,
            path = %path.map(|p| p.display().to_string()).unwrap_or_default(),
            error = %error,
            "addon failed to load"
        );
        self.failures.push(AddonFailure {
            addon: addon.to_string(),
            path: path.map(Path::to_path_buf),
            error,
        });
    }
}

/// Addon name of a directory entry, or `None` for entries to skip.
pub fn addon_name(file_name: &str) -> Option<&str> {
    if file_name.starts_with('.') || IGNORED.contains(&file_name) {
        return None;
    }
    let name = file_name.split('.').next().unwrap_or(file_name);
    (!name.is_empty()).then_some(name)
}

/// Addon entries of `dir` as `(name, path)`, sorted by file name.
pub fn discover_addons(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries: Vec<(String, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let file_name = entry.file_name().into_string().ok()?;
            Some((file_name, entry.path()))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(entries
        .into_iter()
        .filter_map(|(file_name, path)| {
            let name = addon_name(&file_name)?.to_string();
            Some((name, path))
        })
        .collect())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Resolves addons against a catalog and calls each entry at most once.
#[derive(Debug, Clone)]
pub struct AddonLoader {
    catalog: AddonCatalog,
    // Catalog entries already called
    called: Vec<String>,
}

impl AddonLoader {
    pub fn new(catalog: AddonCatalog) -> Self {
        Self { catalog, called: Vec::new() }
    }

    pub fn catalog(&self) -> &AddonCatalog {
        &self.catalog
    }

    /// Catalog entries called so far, in call order
    pub fn called(&self) -> &[String] {
        &self.called
    }

    pub fn is_loaded(&self, entry: &str) -> bool {
        self.called.iter().any(|e| e == entry)
    }

    /// Call catalog entry `entry` on behalf of addon `addon`.
    pub fn invoke(
        &mut self,
        addon: &str,
        entry: &str,
        path: Option<&Path>,
        registry: &PluginRegistry,
    ) -> Result<LoadedAddon, PvError> {
        if self.is_loaded(entry) {
            return Err(PvError::addon_already_loaded(addon));
        }
        let def = *self.catalog.get(entry).ok_or_else(|| {
            let err = PvError::missing_entrypoint(addon);
            if entry == addon {
                err
            } else {
                err.with_note(format!("manifest entry '{}'", entry))
            }
        })?;

        // Marked before the call so a panicking entry is not retried.
        self.called.push(entry.to_string());
        match panic::catch_unwind(AssertUnwindSafe(|| (def.register)(registry))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.with_note(format!("in addon '{}'", addon))),
            Err(payload) => return Err(PvError::addon_panic(addon, panic_message(payload))),
        }

        info!(addon, entry, "loaded addon");
        Ok(LoadedAddon {
            name: addon.to_string(),
            entry: entry.to_string(),
            description: def.description.to_string(),
            path: path.map(Path::to_path_buf),
        })
    }

    /// Load catalog addons by name, in the given order.
    pub fn load_named(&mut self, names: &[String], registry: &PluginRegistry) -> AddonReport {
        let mut report = AddonReport::default();
        for name in names {
            match self.invoke(name, name, None, registry) {
                Ok(loaded) => report.loaded.push(loaded),
                Err(e) => report.fail(name, None, e),
            }
        }
        report
    }

    /// Scan addon directories in order.
    pub fn load_dirs(&mut self, dirs: &[PathBuf], registry: &PluginRegistry) -> AddonReport {
        let mut report = AddonReport::default();
        for dir in dirs {
            self.load_dir(dir, registry, &mut report);
        }
        report
    }

    fn load_dir(&mut self, dir: &Path, registry: &PluginRegistry, report: &mut AddonReport) {
        let entries = match discover_addons(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %dir.display(), "addon directory does not exist");
                return;
            }
            Err(e) => {
                report.fail(&dir.display().to_string(), Some(dir), PvError::from(e));
                return;
            }
        };
        debug!(path = %dir.display(), count = entries.len(), "scanning addon directory");

        for (name, path) in entries {
            let manifest = if path.is_dir() {
                match AddonManifest::load(&path) {
                    Ok(manifest) => manifest,
                    Err(e) => {
                        report.fail(&name, Some(&path), e.into_pv_error(&name));
                        continue;
                    }
                }
            } else {
                None
            };

            let (addon, entry) = match &manifest {
                Some(m) if !m.enabled => {
                    debug!(addon = %m.name, "addon disabled");
                    report.skipped.push(SkippedAddon {
                        name: m.name.clone(),
                        path,
                        reason: "disabled in manifest".to_string(),
                    });
                    continue;
                }
                Some(m) => (m.name.clone(), m.entry().to_string()),
                None => (name.clone(), name),
            };

            match self.invoke(&addon, &entry, Some(&path), registry) {
                Ok(mut loaded) => {
                    if let Some(description) = manifest.and_then(|m| m.description) {
                        loaded.description = description;
                    }
                    report.loaded.push(loaded);
                }
                Err(e) => report.fail(&addon, Some(&path), e),
            }
        }
    }
}
