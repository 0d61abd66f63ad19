//! Plugin traits

use crate::Video;
use pv_core::{Property, PvError, Value};
use serde::Serialize;

/// Metadata for a property group class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupMeta {
    pub idname: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

/// A class of settings contributed by an addon.
///
/// `properties()` is called once per instantiation, so every group instance
/// owns fresh `Property` objects.
pub trait PropertyGroupPlugin: Send + Sync {
    fn meta(&self) -> GroupMeta;
    fn properties(&self) -> Vec<(&'static str, Property)>;

    /// Plain read-only attributes living next to the properties.
    fn attributes(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

/// Metadata for a data group class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataGroupMeta {
    pub idname: &'static str,
    pub description: &'static str,
}

impl DataGroupMeta {
    pub const fn new(idname: &'static str, description: &'static str) -> Self {
        Self { idname, description }
    }
}

/// Metadata for an operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperatorMeta {
    /// Operator group (namespace)
    pub group: &'static str,
    pub idname: &'static str,
    /// Button text
    pub label: &'static str,
    pub description: &'static str,
}

/// A side-effecting action bound to a video when invoked.
pub trait OperatorPlugin: Send + Sync {
    fn meta(&self) -> OperatorMeta;
    fn execute(&self, video: &Video) -> Result<(), PvError>;
}
