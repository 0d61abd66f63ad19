//! Addon catalog
//!
//! Addons are linked into the host. The catalog maps each addon name to the
//! function that registers its classes; the loader resolves names found in
//! addon directories against it.

use crate::PluginRegistry;
use pv_core::PvError;
use serde::Serialize;
use tracing::warn;

/// Registration function of an addon
pub type AddonEntrypoint = fn(&PluginRegistry) -> Result<(), PvError>;

/// One catalog entry
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AddonDef {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub register: AddonEntrypoint,
}

impl AddonDef {
    pub const fn new(name: &'static str, description: &'static str, register: AddonEntrypoint) -> Self {
        Self { name, description, register }
    }
}

/// Table of known addon entrypoints, in insertion order
#[derive(Debug, Clone, Default)]
pub struct AddonCatalog {
    addons: Vec<AddonDef>,
}

impl AddonCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. A later entry with the same name replaces the earlier one.
    pub fn with_addon(mut self, def: AddonDef) -> Self {
        if let Some(existing) = self.addons.iter_mut().find(|a| a.name == def.name) {
            warn!(addon = def.name, "replacing catalog entry");
            *existing = def;
        } else {
            self.addons.push(def);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&AddonDef> {
        self.addons.iter().find(|a| a.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.addons.iter().map(|a| a.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AddonDef> {
        self.addons.iter()
    }

    pub fn len(&self) -> usize {
        self.addons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }
}
