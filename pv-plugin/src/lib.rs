//! Piano Video Plugin System
//!
//! Provides the extension points addons use:
//! - Property groups (typed, validated settings)
//! - Data groups (arbitrary named data)
//! - Operators (side-effecting actions)
//! - Addon catalogs (named registration entrypoints)
//!
//! and the [`Video`] context that instantiates them as they are registered.

mod bus;
mod traits;
mod registry;
mod group;
mod data;
mod ops;
mod video;
mod addon;

pub use bus::{EventBus, Subscription};
pub use traits::{
    PropertyGroupPlugin, GroupMeta,
    OperatorPlugin, OperatorMeta,
    DataGroupMeta,
};
pub use registry::{PluginRegistry, RegistryEvent, RegistryDescription, events};
pub use group::{PropertyGroup, PropertyGroupHandle, GroupDescription, PropertyDescription, AttributeDescription};
pub use data::{DataGroup, DataGroupHandle, DataValue, DataGroupDescription, SlotDescription, RESERVED_NAMES};
pub use ops::{Operator, OpGroup, Ops, OpGroupDescription};
pub use video::{Video, SettingsDoc, VideoDescription, DEFAULT_RESOLUTION, DEFAULT_FPS};
pub use addon::{AddonCatalog, AddonDef, AddonEntrypoint};

/// Re-export core types for addon authors
pub mod prelude {
    pub use crate::{
        PropertyGroupPlugin, GroupMeta,
        OperatorPlugin, OperatorMeta,
        DataGroupMeta, PluginRegistry, Video,
        AddonCatalog, AddonDef,
    };
    pub use pv_core::prelude::*;
}
