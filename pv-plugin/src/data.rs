//! Data groups
//!
//! A [`DataGroup`] is an open bag of named values of any type, attached to a
//! video by addons. Values are stored behind `Arc`, so reading a slot hands
//! back the very allocation that was written.

use crate::DataGroupMeta;
use pv_core::PvError;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Names that belong to the group itself and cannot hold data.
pub const RESERVED_NAMES: [&str; 2] = ["idname", "items"];

/// Opaque shared value stored in a data group
pub type DataValue = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
struct Slot {
    value: DataValue,
    type_name: &'static str,
}

/// Instantiated data group
#[derive(Clone)]
pub struct DataGroup {
    meta: DataGroupMeta,
    // Created on first write.
    items: Option<HashMap<String, Slot>>,
}

impl DataGroup {
    pub fn new(meta: DataGroupMeta) -> Self {
        Self { meta, items: None }
    }

    pub fn idname(&self) -> &'static str {
        self.meta.idname
    }

    pub fn meta(&self) -> &DataGroupMeta {
        &self.meta
    }

    /// Store `value` under `name`, replacing whatever was there.
    pub fn set<T: Any + Send + Sync>(&mut self, name: &str, value: T) -> Result<(), PvError> {
        self.set_shared(name, Arc::new(value))
    }

    /// Store an existing shared value under `name`.
    pub fn set_shared<T: Any + Send + Sync>(&mut self, name: &str, value: Arc<T>) -> Result<(), PvError> {
        if RESERVED_NAMES.contains(&name) {
            return Err(PvError::reserved_name(name)
                .with_note(format!("in data group '{}'", self.meta.idname)));
        }
        if name.is_empty() {
            return Err(PvError::invalid_idname("data slot", name));
        }
        self.items.get_or_insert_with(HashMap::new).insert(
            name.to_string(),
            Slot { value: value as DataValue, type_name: std::any::type_name::<T>() },
        );
        Ok(())
    }

    /// The value stored under `name`, as the type it was written with.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, PvError> {
        let slot = self.slot(name)?;
        Arc::clone(&slot.value)
            .downcast::<T>()
            .map_err(|_| PvError::type_mismatch(std::any::type_name::<T>(), slot.type_name)
                .with_note(format!("reading '{}.{}'", self.meta.idname, name)))
    }

    /// The stored value without a type check.
    pub fn get_any(&self, name: &str) -> Result<DataValue, PvError> {
        self.slot(name).map(|slot| Arc::clone(&slot.value))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.as_ref().is_some_and(|items| items.contains_key(name))
    }

    pub fn remove(&mut self, name: &str) -> Result<DataValue, PvError> {
        self.items
            .as_mut()
            .and_then(|items| items.remove(name))
            .map(|slot| slot.value)
            .ok_or_else(|| PvError::data_not_found(self.meta.idname, name))
    }

    /// Slot names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .items
            .as_ref()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.items.as_ref().map_or(0, |items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn describe(&self) -> DataGroupDescription {
        DataGroupDescription {
            idname: self.meta.idname,
            description: self.meta.description,
            slots: self
                .names()
                .into_iter()
                .filter_map(|name| {
                    let type_name = self.items.as_ref()?.get(&name)?.type_name;
                    Some(SlotDescription { name, type_name })
                })
                .collect(),
        }
    }

    fn slot(&self, name: &str) -> Result<&Slot, PvError> {
        self.items
            .as_ref()
            .and_then(|items| items.get(name))
            .ok_or_else(|| PvError::data_not_found(self.meta.idname, name))
    }
}

impl std::fmt::Debug for DataGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataGroup")
            .field("idname", &self.meta.idname)
            .field("names", &self.names())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataGroupDescription {
    pub idname: &'static str,
    pub description: &'static str,
    pub slots: Vec<SlotDescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
}

/// Shared handle to a data group owned by a [`crate::Video`].
#[derive(Debug, Clone)]
pub struct DataGroupHandle {
    idname: &'static str,
    inner: Arc<RwLock<DataGroup>>,
}

impl DataGroupHandle {
    pub(crate) fn new(group: DataGroup) -> Self {
        Self {
            idname: group.idname(),
            inner: Arc::new(RwLock::new(group)),
        }
    }

    pub fn idname(&self) -> &'static str {
        self.idname
    }

    pub fn read(&self) -> RwLockReadGuard<'_, DataGroup> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, DataGroup> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<(), PvError> {
        self.write().set(name, value)
    }

    pub fn set_shared<T: Any + Send + Sync>(&self, name: &str, value: Arc<T>) -> Result<(), PvError> {
        self.write().set_shared(name, value)
    }

    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, PvError> {
        self.read().get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains(name)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
