//! Video context
//!
//! A [`Video`] holds the session-wide settings (resolution, frame rate) and
//! one instance of every registered property group and data group. It is
//! the context operators run against.

use crate::bus::Subscription;
use crate::registry::{events, RegistryEvent};
use crate::{
    DataGroup, DataGroupDescription, DataGroupHandle, DataGroupMeta, GroupDescription, OpGroupDescription, Ops,
    PluginRegistry, PropertyGroup, PropertyGroupHandle, PropertyGroupPlugin,
};
use pv_core::{Property, PvError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, Weak};
use tracing::{debug, warn};

pub const DEFAULT_RESOLUTION: (u32, u32) = (1920, 1080);
pub const DEFAULT_FPS: f64 = 30.0;

/// Split `"group.name"` into its two segments.
pub(crate) fn split_path(path: &str) -> Result<(&str, &str), PvError> {
    match path.split_once('.') {
        Some((group, name)) if !group.is_empty() && !name.is_empty() => Ok((group, name)),
        _ => Err(PvError::invalid_path(path)),
    }
}

fn validate_resolution(resolution: (u32, u32)) -> Result<(), PvError> {
    if resolution.0 == 0 || resolution.1 == 0 {
        return Err(PvError::invalid_value(format!(
            "resolution must be positive, got {}x{}",
            resolution.0, resolution.1
        )));
    }
    Ok(())
}

fn validate_fps(fps: f64) -> Result<(), PvError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(PvError::invalid_value(format!("fps must be positive, got {}", fps)));
    }
    Ok(())
}

#[derive(Default)]
struct Groups {
    props: Vec<PropertyGroupHandle>,
    data: Vec<DataGroupHandle>,
}

impl Groups {
    fn add_property_group(&mut self, class: &dyn PropertyGroupPlugin) {
        let idname = class.meta().idname;
        if self.props.iter().any(|g| g.idname() == idname) {
            return;
        }
        match PropertyGroup::instantiate(class) {
            Ok(group) => {
                debug!(idname, "video gained property group");
                self.props.push(PropertyGroupHandle::new(group));
            }
            Err(e) => warn!(idname, error = %e, "could not instantiate property group"),
        }
    }

    fn add_data_group(&mut self, meta: DataGroupMeta) {
        if self.data.iter().any(|d| d.idname() == meta.idname) {
            return;
        }
        debug!(idname = meta.idname, "video gained data group");
        self.data.push(DataGroupHandle::new(DataGroup::new(meta)));
    }
}

/// Called from the registry bus; holds only a weak reference so a dropped
/// video is never kept alive by its listener.
fn on_registration(groups: &Weak<RwLock<Groups>>, event: &RegistryEvent) {
    let Some(groups) = groups.upgrade() else {
        return;
    };
    let mut groups = groups.write().unwrap_or_else(|e| e.into_inner());
    match event {
        RegistryEvent::PropertyGroup(class) => groups.add_property_group(class.as_ref()),
        RegistryEvent::DataGroup(meta) => groups.add_data_group(*meta),
        RegistryEvent::Operator(_) => {}
    }
}

/// All settings of a video, and the context for operators.
pub struct Video {
    resolution: (u32, u32),
    fps: f64,
    groups: Arc<RwLock<Groups>>,
    registry: PluginRegistry,
    _subscriptions: Vec<Subscription>,
}

impl Video {
    /// A 1920x1080, 30 fps video.
    pub fn new(registry: &PluginRegistry) -> Self {
        let mut video = Self {
            resolution: DEFAULT_RESOLUTION,
            fps: DEFAULT_FPS,
            groups: Arc::new(RwLock::new(Groups::default())),
            registry: registry.clone(),
            _subscriptions: Vec::new(),
        };
        video.attach();
        video
    }

    /// A video with explicit settings. The frame rate may be fractional.
    pub fn with_settings(registry: &PluginRegistry, resolution: (u32, u32), fps: f64) -> Result<Self, PvError> {
        validate_resolution(resolution)?;
        validate_fps(fps)?;
        let mut video = Self::new(registry);
        video.resolution = resolution;
        video.fps = fps;
        Ok(video)
    }

    /// Subscribe to future registrations, then materialize every class
    /// registered so far. Classes seen twice are instantiated once.
    fn attach(&mut self) {
        for kind in [events::PGROUP, events::DGROUP] {
            let weak = Arc::downgrade(&self.groups);
            self._subscriptions
                .push(self.registry.subscribe(kind, move |event| on_registration(&weak, event)));
        }

        let mut groups = self.groups.write().unwrap_or_else(|e| e.into_inner());
        for class in self.registry.property_groups() {
            groups.add_property_group(class.as_ref());
        }
        for meta in self.registry.data_groups() {
            groups.add_data_group(meta);
        }
    }

    fn groups(&self) -> RwLockReadGuard<'_, Groups> {
        self.groups.read().unwrap_or_else(|e| e.into_inner())
    }

    // ========== Settings ==========

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn set_resolution(&mut self, resolution: (u32, u32)) -> Result<(), PvError> {
        validate_resolution(resolution)?;
        self.resolution = resolution;
        Ok(())
    }

    pub fn set_fps(&mut self, fps: f64) -> Result<(), PvError> {
        validate_fps(fps)?;
        self.fps = fps;
        Ok(())
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    // ========== Groups ==========

    pub fn group(&self, idname: &str) -> Result<PropertyGroupHandle, PvError> {
        self.groups()
            .props
            .iter()
            .find(|g| g.idname() == idname)
            .cloned()
            .ok_or_else(|| PvError::group_not_found(idname))
    }

    /// Property groups in registration order
    pub fn property_groups(&self) -> Vec<PropertyGroupHandle> {
        self.groups().props.clone()
    }

    pub fn group_names(&self) -> Vec<&'static str> {
        self.groups().props.iter().map(|g| g.idname()).collect()
    }

    pub fn data(&self, idname: &str) -> Result<DataGroupHandle, PvError> {
        self.groups()
            .data
            .iter()
            .find(|d| d.idname() == idname)
            .cloned()
            .ok_or_else(|| PvError::data_group_not_found(idname))
    }

    /// Data groups in registration order
    pub fn data_groups(&self) -> Vec<DataGroupHandle> {
        self.groups().data.clone()
    }

    pub fn data_names(&self) -> Vec<&'static str> {
        self.groups().data.iter().map(|d| d.idname()).collect()
    }

    // ========== Paths ==========

    /// Value at `"group.prop"`.
    pub fn get(&self, path: &str) -> Result<Value, PvError> {
        let (group, name) = split_path(path)?;
        self.group(group)?.get(name)
    }

    /// Write the value at `"group.prop"`.
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), PvError> {
        let (group, name) = split_path(path)?;
        self.group(group)?.set(name, value)
    }

    /// The `Property` object at `"group.prop"`.
    pub fn raw(&self, path: &str) -> Result<Property, PvError> {
        let (group, name) = split_path(path)?;
        self.group(group)?.raw(name)
    }

    pub fn ops(&self) -> Ops<'_> {
        Ops::new(self)
    }

    // ========== Presets ==========

    pub fn reset_all(&self) {
        for group in self.property_groups() {
            group.reset();
        }
    }

    /// Snapshot of the resolution, frame rate, and every property value.
    pub fn export_settings(&self) -> SettingsDoc {
        let groups = self
            .property_groups()
            .iter()
            .map(|handle| {
                let group = handle.read();
                let values = group
                    .properties()
                    .map(|(name, prop)| (name.to_string(), prop.value().clone()))
                    .collect();
                (handle.idname().to_string(), values)
            })
            .collect();

        SettingsDoc { resolution: self.resolution, fps: self.fps, groups }
    }

    /// Apply a snapshot. Either every value is applied or, on the first
    /// unknown name or rejected value, nothing is.
    pub fn apply_settings(&mut self, doc: &SettingsDoc) -> Result<(), PvError> {
        validate_resolution(doc.resolution)?;
        validate_fps(doc.fps)?;

        let mut staged: Vec<(PropertyGroupHandle, PropertyGroup)> = Vec::with_capacity(doc.groups.len());
        for (idname, values) in &doc.groups {
            let handle = self.group(idname)?;
            let mut group = handle.read().clone();
            for (name, value) in values {
                group.set(name, value.clone())?;
            }
            staged.push((handle, group));
        }

        for (handle, group) in staged {
            handle.replace(group);
        }
        self.resolution = doc.resolution;
        self.fps = doc.fps;
        Ok(())
    }

    pub fn describe(&self) -> VideoDescription {
        VideoDescription {
            resolution: self.resolution,
            fps: self.fps,
            groups: self.property_groups().iter().map(|g| g.read().describe()).collect(),
            data_groups: self.data_groups().iter().map(|d| d.read().describe()).collect(),
            op_groups: self.ops().describe(),
        }
    }
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Video")
            .field("resolution", &self.resolution)
            .field("fps", &self.fps)
            .field("groups", &self.group_names())
            .field("data", &self.data_names())
            .finish()
    }
}

/// Saved video settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsDoc {
    pub resolution: (u32, u32),
    pub fps: f64,
    #[serde(default)]
    pub groups: BTreeMap<String, BTreeMap<String, Value>>,
}

/// Serializable view of a whole video
#[derive(Debug, Clone, Serialize)]
pub struct VideoDescription {
    pub resolution: (u32, u32),
    pub fps: f64,
    pub groups: Vec<GroupDescription>,
    pub data_groups: Vec<DataGroupDescription>,
    pub op_groups: Vec<OpGroupDescription>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GroupMeta;
    use pv_core::ErrorKind;

    struct Simple {
        idname: &'static str,
    }

    impl PropertyGroupPlugin for Simple {
        fn meta(&self) -> GroupMeta {
            GroupMeta { idname: self.idname, label: self.idname, description: "" }
        }

        fn properties(&self) -> Vec<(&'static str, Property)> {
            vec![
                ("enabled", Property::bool(true)),
                ("intensity", Property::float_range(1.0, 0.0, 10.0)),
            ]
        }
    }

    fn registry_with(idnames: &[&'static str]) -> PluginRegistry {
        let registry = PluginRegistry::new();
        for &idname in idnames {
            registry.register_property_group(Simple { idname }).unwrap();
        }
        registry
    }

    #[test]
    fn test_defaults() {
        let video = Video::new(&PluginRegistry::new());
        assert_eq!(video.resolution(), (1920, 1080));
        assert_eq!(video.fps(), 30.0);
        assert!(video.group_names().is_empty());
    }

    #[test]
    fn test_settings_validated() {
        let registry = PluginRegistry::new();
        assert!(Video::with_settings(&registry, (0, 1080), 30.0).is_err());
        assert!(Video::with_settings(&registry, (1280, 720), 0.0).is_err());
        assert!(Video::with_settings(&registry, (1280, 720), f64::NAN).is_err());

        let mut video = Video::with_settings(&registry, (1280, 720), 29.97).unwrap();
        assert_eq!(video.resolution(), (1280, 720));
        assert!(video.set_fps(-1.0).is_err());
        assert_eq!(video.fps(), 29.97);
        video.set_resolution((640, 480)).unwrap();
        assert_eq!(video.resolution(), (640, 480));
    }

    #[test]
    fn test_groups_in_registration_order() {
        let video = Video::new(&registry_with(&["pitch", "smoke", "keyboard"]));
        assert_eq!(video.group_names(), vec!["pitch", "smoke", "keyboard"]);
    }

    #[test]
    fn test_group_identity_is_stable() {
        let video = Video::new(&registry_with(&["pitch"]));
        let a = video.group("pitch").unwrap();
        let b = video.group("pitch").unwrap();
        assert!(a.ptr_eq(&b));

        a.set("enabled", false).unwrap();
        assert_eq!(b.get("enabled").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_videos_do_not_share_groups() {
        let registry = registry_with(&["pitch"]);
        let first = Video::new(&registry);
        let second = Video::new(&registry);
        first.set("pitch.enabled", false).unwrap();
        assert_eq!(second.get("pitch.enabled").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_paths_and_errors() {
        let video = Video::new(&registry_with(&["pitch"]));
        video.set("pitch.intensity", 2.5).unwrap();
        assert_eq!(video.get("pitch.intensity").unwrap(), Value::Float(2.5));
        assert_eq!(video.raw("pitch.intensity").unwrap().default_value(), &Value::Float(1.0));

        assert_eq!(video.get("nope.enabled").unwrap_err().code, pv_core::codes::GROUP_NOT_FOUND);
        assert_eq!(video.get("pitch.nope").unwrap_err().code, pv_core::codes::PROPERTY_NOT_FOUND);
        assert_eq!(video.get("pitch").unwrap_err().code, pv_core::codes::INVALID_PATH);
        assert_eq!(video.get(".enabled").unwrap_err().code, pv_core::codes::INVALID_PATH);
        assert_eq!(video.set("pitch.enabled", 3).unwrap_err().kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_late_registration_reaches_live_video() {
        let registry = registry_with(&["pitch"]);
        let video = Video::new(&registry);
        assert!(video.group("smoke").is_err());

        registry.register_property_group(Simple { idname: "smoke" }).unwrap();
        registry.register_data_group(DataGroupMeta::new("cache", "")).unwrap();

        assert_eq!(video.get("smoke.enabled").unwrap(), Value::Bool(true));
        assert_eq!(video.group_names(), vec!["pitch", "smoke"]);
        assert_eq!(video.data_names(), vec!["cache"]);
    }

    #[test]
    fn test_drop_releases_subscriptions() {
        let registry = registry_with(&["pitch"]);
        let video = Video::new(&registry);
        assert_eq!(registry.subscriber_count(events::PGROUP), 1);
        assert_eq!(registry.subscriber_count(events::DGROUP), 1);

        drop(video);
        assert_eq!(registry.subscriber_count(events::PGROUP), 0);
        assert_eq!(registry.subscriber_count(events::DGROUP), 0);
        registry.register_property_group(Simple { idname: "late" }).unwrap();
    }

    #[test]
    fn test_rejected_registration_never_reaches_video() {
        let registry = registry_with(&["pitch"]);
        let video = Video::new(&registry);

        let err = registry.register_property_group(Simple { idname: "bad.name" }).unwrap_err();
        assert_eq!(err.code, pv_core::codes::INVALID_IDNAME);
        let err = registry.register_property_group(Simple { idname: "pitch" }).unwrap_err();
        assert_eq!(err.code, pv_core::codes::DUPLICATE_IDNAME);

        assert_eq!(video.group_names(), vec!["pitch"]);
        assert_eq!(registry.property_groups().len(), 1);
    }

    #[test]
    fn test_class_seen_twice_instantiated_once() {
        let registry = registry_with(&["pitch"]);
        registry.register_data_group(DataGroupMeta::new("cache", "")).unwrap();
        let video = Video::new(&registry);
        let pitch = video.group("pitch").unwrap();
        pitch.set("enabled", false).unwrap();
        let cache = video.data("cache").unwrap();

        let weak = Arc::downgrade(&video.groups);
        for class in registry.property_groups() {
            on_registration(&weak, &RegistryEvent::PropertyGroup(class));
        }
        on_registration(&weak, &RegistryEvent::DataGroup(DataGroupMeta::new("cache", "")));

        assert_eq!(video.group_names(), vec!["pitch"]);
        assert_eq!(video.data_names(), vec!["cache"]);
        assert!(video.group("pitch").unwrap().ptr_eq(&pitch));
        assert!(video.data("cache").unwrap().ptr_eq(&cache));
        assert_eq!(video.get("pitch.enabled").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_data_groups() {
        let registry = PluginRegistry::new();
        registry.register_data_group(DataGroupMeta::new("cache", "Smoke cache")).unwrap();
        let video = Video::new(&registry);

        let cache = video.data("cache").unwrap();
        cache.set("frame", 12usize).unwrap();
        assert_eq!(*video.data("cache").unwrap().get::<usize>("frame").unwrap(), 12);
        assert!(video.data("cache").unwrap().ptr_eq(&cache));
        assert_eq!(video.data("nope").unwrap_err().code, pv_core::codes::DATA_GROUP_NOT_FOUND);
    }

    #[test]
    fn test_export_apply_round_trip() {
        let registry = registry_with(&["pitch", "smoke"]);
        let mut video = Video::new(&registry);
        video.set("smoke.intensity", 4.0).unwrap();
        video.set_fps(60.0).unwrap();
        let doc = video.export_settings();

        let json = serde_json::to_string(&doc).unwrap();
        let parsed: SettingsDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);

        let mut other = Video::new(&registry);
        other.apply_settings(&parsed).unwrap();
        assert_eq!(other.get("smoke.intensity").unwrap(), Value::Float(4.0));
        assert_eq!(other.fps(), 60.0);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let registry = registry_with(&["pitch", "smoke"]);
        let mut video = Video::new(&registry);
        let mut doc = video.export_settings();
        doc.groups.get_mut("pitch").unwrap().insert("enabled".into(), Value::Bool(false));
        doc.groups.get_mut("smoke").unwrap().insert("intensity".into(), Value::Float(99.0));
        doc.fps = 24.0;

        let err = video.apply_settings(&doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        assert_eq!(video.get("pitch.enabled").unwrap(), Value::Bool(true));
        assert_eq!(video.fps(), 30.0);
    }

    #[test]
    fn test_reset_all_and_describe() {
        let video = Video::new(&registry_with(&["pitch"]));
        video.set("pitch.enabled", false).unwrap();
        video.reset_all();
        assert_eq!(video.get("pitch.enabled").unwrap(), Value::Bool(true));

        let json = serde_json::to_value(video.describe()).unwrap();
        assert_eq!(json["resolution"], serde_json::json!([1920, 1080]));
        assert_eq!(json["groups"][0]["idname"], "pitch");
    }
}
