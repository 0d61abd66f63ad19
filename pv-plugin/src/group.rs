//! Property groups
//!
//! A [`PropertyGroup`] is the per-video instance of a
//! [`PropertyGroupPlugin`] class. Reads of a declared property yield its
//! value, writes go through the property's validation, and [`PropertyGroup::raw`]
//! bypasses the unwrapping to expose the `Property` itself (for widget
//! binding).

use crate::{GroupMeta, PropertyGroupPlugin};
use pv_core::{Property, PvError, Value};
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Instantiated property group
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    meta: GroupMeta,
    props: Vec<(&'static str, Property)>,
    attrs: Vec<(&'static str, Value)>,
}

impl PropertyGroup {
    /// Build a fresh instance of `class`.
    ///
    /// Fails if a name is declared twice or a default does not satisfy its
    /// property's kind.
    pub fn instantiate(class: &dyn PropertyGroupPlugin) -> Result<Self, PvError> {
        let meta = class.meta();
        let props = class.properties();
        let attrs = class.attributes();

        let mut seen: Vec<&str> = Vec::with_capacity(props.len() + attrs.len());
        for name in props.iter().map(|(n, _)| *n).chain(attrs.iter().map(|(n, _)| *n)) {
            if name.is_empty() || seen.contains(&name) {
                return Err(PvError::duplicate_idname("property", name)
                    .with_note(format!("in property group '{}'", meta.idname)));
            }
            seen.push(name);
        }
        for (name, prop) in &props {
            prop.validate().map_err(|e| {
                PvError::from(e).with_note(format!("default of '{}.{}'", meta.idname, name))
            })?;
        }

        Ok(Self { meta, props, attrs })
    }

    pub fn idname(&self) -> &'static str {
        self.meta.idname
    }

    pub fn meta(&self) -> &GroupMeta {
        &self.meta
    }

    /// Value of a property, or a plain attribute as-is.
    pub fn get(&self, name: &str) -> Result<Value, PvError> {
        if let Some(prop) = self.find(name) {
            return Ok(prop.value().clone());
        }
        self.attrs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| PvError::property_not_found(self.meta.idname, name))
    }

    /// Write into a property's value slot. Plain attributes are read-only
    /// and unknown names are rejected.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), PvError> {
        let idname = self.meta.idname;
        if let Some((_, prop)) = self.props.iter_mut().find(|(n, _)| *n == name) {
            return prop.set(value.into()).map_err(|e| {
                PvError::from(e).with_note(format!("writing '{}.{}'", idname, name))
            });
        }
        if self.attrs.iter().any(|(n, _)| *n == name) {
            return Err(PvError::read_only(idname, name));
        }
        Err(PvError::property_not_found(idname, name))
    }

    /// The `Property` object behind `name`.
    pub fn raw(&self, name: &str) -> Result<&Property, PvError> {
        self.find(name)
            .ok_or_else(|| PvError::property_not_found(self.meta.idname, name))
    }

    pub fn raw_mut(&mut self, name: &str) -> Result<&mut Property, PvError> {
        let idname = self.meta.idname;
        self.props
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map(|(_, p)| p)
            .ok_or_else(|| PvError::property_not_found(idname, name))
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Declared property names, in declaration order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.props.iter().map(|(n, _)| *n)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&'static str, &Property)> + '_ {
        self.props.iter().map(|(n, p)| (*n, p))
    }

    /// Restore every property to its default.
    pub fn reset(&mut self) {
        for (_, prop) in &mut self.props {
            prop.reset();
        }
    }

    pub fn describe(&self) -> GroupDescription {
        GroupDescription {
            idname: self.meta.idname,
            label: self.meta.label,
            description: self.meta.description,
            properties: self
                .props
                .iter()
                .map(|(name, property)| PropertyDescription { name, property: property.clone() })
                .collect(),
            attributes: self
                .attrs
                .iter()
                .map(|(name, value)| AttributeDescription { name, value: value.clone() })
                .collect(),
        }
    }

    fn find(&self, name: &str) -> Option<&Property> {
        self.props.iter().find(|(n, _)| *n == name).map(|(_, p)| p)
    }
}

/// Serializable view of a group, for GUI binding and listings
#[derive(Debug, Clone, Serialize)]
pub struct GroupDescription {
    pub idname: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub properties: Vec<PropertyDescription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDescription>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyDescription {
    pub name: &'static str,
    #[serde(flatten)]
    pub property: Property,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttributeDescription {
    pub name: &'static str,
    pub value: Value,
}

/// Shared handle to a group owned by a [`crate::Video`].
///
/// Every lookup of the same idname on the same video returns a handle to
/// the same instance; [`PropertyGroupHandle::ptr_eq`] observes that.
#[derive(Debug, Clone)]
pub struct PropertyGroupHandle {
    idname: &'static str,
    inner: Arc<RwLock<PropertyGroup>>,
}

impl PropertyGroupHandle {
    pub(crate) fn new(group: PropertyGroup) -> Self {
        Self {
            idname: group.idname(),
            inner: Arc::new(RwLock::new(group)),
        }
    }

    pub fn idname(&self) -> &'static str {
        self.idname
    }

    pub fn read(&self) -> RwLockReadGuard<'_, PropertyGroup> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, PropertyGroup> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, name: &str) -> Result<Value, PvError> {
        self.read().get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), PvError> {
        self.write().set(name, value)
    }

    /// Snapshot of the `Property` object behind `name`.
    pub fn raw(&self, name: &str) -> Result<Property, PvError> {
        self.read().raw(name).cloned()
    }

    pub fn reset(&self) {
        self.write().reset()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Swap in a fully prepared instance of the same class.
    pub(crate) fn replace(&self, group: PropertyGroup) {
        *self.write() = group;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::ErrorKind;

    struct Pitch;

    impl PropertyGroupPlugin for Pitch {
        fn meta(&self) -> GroupMeta {
            GroupMeta { idname: "pitch", label: "Pitch", description: "Pitch display" }
        }

        fn properties(&self) -> Vec<(&'static str, Property)> {
            vec![
                ("enabled", Property::bool(true)),
                ("semitones", Property::int_range(0, -24, 24)),
            ]
        }

        fn attributes(&self) -> Vec<(&'static str, Value)> {
            vec![("version", Value::Int(2))]
        }
    }

    struct Clashing;

    impl PropertyGroupPlugin for Clashing {
        fn meta(&self) -> GroupMeta {
            GroupMeta { idname: "clash", label: "", description: "" }
        }

        fn properties(&self) -> Vec<(&'static str, Property)> {
            vec![("a", Property::bool(true)), ("a", Property::int(1))]
        }
    }

    #[test]
    fn test_get_unwraps_value() {
        let group = PropertyGroup::instantiate(&Pitch).unwrap();
        assert_eq!(group.get("enabled").unwrap(), Value::Bool(true));
        assert_eq!(group.get("version").unwrap(), Value::Int(2));
    }

    #[test]
    fn test_set_round_trip_and_raw() {
        let mut group = PropertyGroup::instantiate(&Pitch).unwrap();
        group.set("enabled", false).unwrap();
        assert_eq!(group.get("enabled").unwrap(), Value::Bool(false));

        let raw = group.raw("enabled").unwrap();
        assert_eq!(raw.value(), &Value::Bool(false));
        assert_eq!(raw.default_value(), &Value::Bool(true));

        group.raw_mut("semitones").unwrap().set(Value::Int(7)).unwrap();
        assert_eq!(group.get("semitones").unwrap(), Value::Int(7));
        assert!(group.raw_mut("version").is_err());
    }

    #[test]
    fn test_set_errors() {
        let mut group = PropertyGroup::instantiate(&Pitch).unwrap();

        let err = group.set("enabld", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = group.set("version", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = group.set("enabled", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = group.set("semitones", 30).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(group.get("semitones").unwrap(), Value::Int(0));

        assert!(group.raw("version").is_err());
    }

    #[test]
    fn test_instances_are_independent() {
        let mut a = PropertyGroup::instantiate(&Pitch).unwrap();
        let b = PropertyGroup::instantiate(&Pitch).unwrap();
        a.set("enabled", false).unwrap();
        assert_eq!(b.get("enabled").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_reset_and_names() {
        let mut group = PropertyGroup::instantiate(&Pitch).unwrap();
        group.set("semitones", 5).unwrap();
        group.reset();
        assert_eq!(group.get("semitones").unwrap(), Value::Int(0));
        assert_eq!(group.names().collect::<Vec<_>>(), vec!["enabled", "semitones"]);
    }

    #[test]
    fn test_duplicate_property_name() {
        let err = PropertyGroup::instantiate(&Clashing).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_handle_shares_instance() {
        let handle = PropertyGroupHandle::new(PropertyGroup::instantiate(&Pitch).unwrap());
        let other = handle.clone();
        other.set("enabled", false).unwrap();
        assert_eq!(handle.get("enabled").unwrap(), Value::Bool(false));
        assert!(handle.ptr_eq(&other));
        assert_eq!(handle.raw("semitones").unwrap().kind().name(), "Int");
    }

    #[test]
    fn test_describe_serializes() {
        let group = PropertyGroup::instantiate(&Pitch).unwrap();
        let json = serde_json::to_value(group.describe()).unwrap();
        assert_eq!(json["idname"], "pitch");
        assert_eq!(json["properties"][0]["name"], "enabled");
        assert_eq!(json["properties"][0]["kind"], "bool");
        assert_eq!(json["properties"][1]["min"], -24);
    }
}
