//! Plugin Registry
//!
//! Holds every class registered by addons, in registration order, and
//! announces each registration on its [`EventBus`] so live videos can pick
//! up classes registered after they were created.

use crate::bus::{EventBus, Subscription};
use crate::{DataGroupMeta, GroupMeta, OperatorMeta, OperatorPlugin, PropertyGroup, PropertyGroupPlugin};
use pv_core::PvError;
use serde::Serialize;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use tracing::debug;

/// Event kinds published by the registry
pub mod events {
    pub const PGROUP: &str = "pgroup";
    pub const DGROUP: &str = "dgroup";
    pub const OPERATOR: &str = "operator";
}

/// Payload published on each registration
#[derive(Clone)]
pub enum RegistryEvent {
    PropertyGroup(Arc<dyn PropertyGroupPlugin>),
    DataGroup(DataGroupMeta),
    Operator(Arc<dyn OperatorPlugin>),
}

impl RegistryEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryEvent::PropertyGroup(_) => events::PGROUP,
            RegistryEvent::DataGroup(_) => events::DGROUP,
            RegistryEvent::Operator(_) => events::OPERATOR,
        }
    }
}

#[derive(Default)]
struct Classes {
    pgroups: Vec<Arc<dyn PropertyGroupPlugin>>,
    dgroups: Vec<DataGroupMeta>,
    operators: Vec<Arc<dyn OperatorPlugin>>,
}

/// Central plugin registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    classes: Arc<RwLock<Classes>>,
    bus: EventBus<RegistryEvent>,
}

/// Idnames become path segments (`group.prop`), so they must be non-empty
/// and free of dots and whitespace.
fn valid_idname(idname: &str) -> bool {
    !idname.is_empty() && !idname.contains('.') && !idname.chars().any(char::is_whitespace)
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn classes(&self) -> RwLockReadGuard<'_, Classes> {
        self.classes.read().unwrap_or_else(|e| e.into_inner())
    }

    // ========== Registration ==========

    /// Register a property group class. The idname must be unique among
    /// property groups; the class is instantiated once up front so schema
    /// errors surface here rather than on first use.
    pub fn register_property_group<G: PropertyGroupPlugin + 'static>(&self, group: G) -> Result<(), PvError> {
        let meta = group.meta();
        if !valid_idname(meta.idname) {
            return Err(PvError::invalid_idname("property group", meta.idname));
        }
        PropertyGroup::instantiate(&group)?;

        let class: Arc<dyn PropertyGroupPlugin> = Arc::new(group);
        {
            let mut classes = self.classes.write().unwrap_or_else(|e| e.into_inner());
            if classes.pgroups.iter().any(|g| g.meta().idname == meta.idname) {
                return Err(PvError::duplicate_idname("Property group", meta.idname));
            }
            classes.pgroups.push(Arc::clone(&class));
        }

        debug!(idname = meta.idname, "registered property group");
        self.bus.publish(events::PGROUP, &RegistryEvent::PropertyGroup(class));
        Ok(())
    }

    pub fn register_data_group(&self, meta: DataGroupMeta) -> Result<(), PvError> {
        if !valid_idname(meta.idname) {
            return Err(PvError::invalid_idname("data group", meta.idname));
        }
        {
            let mut classes = self.classes.write().unwrap_or_else(|e| e.into_inner());
            if classes.dgroups.iter().any(|d| d.idname == meta.idname) {
                return Err(PvError::duplicate_idname("Data group", meta.idname));
            }
            classes.dgroups.push(meta);
        }

        debug!(idname = meta.idname, "registered data group");
        self.bus.publish(events::DGROUP, &RegistryEvent::DataGroup(meta));
        Ok(())
    }

    /// Register an operator. `(group, idname)` must be unique.
    pub fn register_operator<O: OperatorPlugin + 'static>(&self, op: O) -> Result<(), PvError> {
        let meta = op.meta();
        if !valid_idname(meta.group) {
            return Err(PvError::invalid_idname("operator group", meta.group));
        }
        if !valid_idname(meta.idname) {
            return Err(PvError::invalid_idname("operator", meta.idname));
        }

        let op: Arc<dyn OperatorPlugin> = Arc::new(op);
        {
            let mut classes = self.classes.write().unwrap_or_else(|e| e.into_inner());
            let taken = classes.operators.iter().any(|o| {
                let m = o.meta();
                m.group == meta.group && m.idname == meta.idname
            });
            if taken {
                return Err(PvError::duplicate_idname(
                    "Operator",
                    &format!("{}.{}", meta.group, meta.idname),
                ));
            }
            classes.operators.push(Arc::clone(&op));
        }

        debug!(group = meta.group, idname = meta.idname, "registered operator");
        self.bus.publish(events::OPERATOR, &RegistryEvent::Operator(op));
        Ok(())
    }

    // ========== Lookup ==========

    /// Property group classes in registration order
    pub fn property_groups(&self) -> Vec<Arc<dyn PropertyGroupPlugin>> {
        self.classes().pgroups.clone()
    }

    pub fn get_property_group(&self, idname: &str) -> Option<Arc<dyn PropertyGroupPlugin>> {
        self.classes().pgroups.iter().find(|g| g.meta().idname == idname).cloned()
    }

    /// Data group classes in registration order
    pub fn data_groups(&self) -> Vec<DataGroupMeta> {
        self.classes().dgroups.clone()
    }

    /// Operators of `group` in registration order
    pub fn operators_in(&self, group: &str) -> Vec<Arc<dyn OperatorPlugin>> {
        self.classes()
            .operators
            .iter()
            .filter(|o| o.meta().group == group)
            .cloned()
            .collect()
    }

    pub fn get_operator(&self, group: &str, idname: &str) -> Option<Arc<dyn OperatorPlugin>> {
        self.classes()
            .operators
            .iter()
            .find(|o| {
                let m = o.meta();
                m.group == group && m.idname == idname
            })
            .cloned()
    }

    /// Operator group names, in order of their first operator's registration
    pub fn op_group_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Vec::new();
        for op in &self.classes().operators {
            let group = op.meta().group;
            if !names.contains(&group) {
                names.push(group);
            }
        }
        names
    }

    // ========== Notifications ==========

    /// Listen for registrations of `kind` (see [`events`]).
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, kind: &str, callback: F) -> Subscription
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, callback)
    }

    /// Number of live listeners for `kind`
    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.bus.subscriber_count(kind)
    }

    // ========== Help ==========

    pub fn describe(&self) -> RegistryDescription {
        let classes = self.classes();
        RegistryDescription {
            property_groups: classes.pgroups.iter().map(|g| g.meta()).collect(),
            data_groups: classes.dgroups.clone(),
            operators: classes.operators.iter().map(|o| o.meta()).collect(),
        }
    }
}

/// Serializable listing of every registered class
#[derive(Debug, Clone, Serialize)]
pub struct RegistryDescription {
    pub property_groups: Vec<GroupMeta>,
    pub data_groups: Vec<DataGroupMeta>,
    pub operators: Vec<OperatorMeta>,
}
