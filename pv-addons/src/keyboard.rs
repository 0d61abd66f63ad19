//! Piano keyboard addon
//!
//! Settings for the on-screen keyboard and an operator that restores them.

use pv_core::{Property, PvError, Value};
use pv_plugin::{GroupMeta, OperatorMeta, OperatorPlugin, PluginRegistry, PropertyGroupPlugin, Video};

/// Keys on a standard piano
pub const NUM_KEYS: i64 = 88;

// ============ keyboard ============

pub struct KeyboardSettings;

impl PropertyGroupPlugin for KeyboardSettings {
    fn meta(&self) -> GroupMeta {
        GroupMeta {
            idname: "keyboard",
            label: "Keyboard",
            description: "Appearance of the piano keyboard",
        }
    }

    fn properties(&self) -> Vec<(&'static str, Property)> {
        vec![
            ("enabled", Property::bool(true).with_label("Show keyboard")),
            (
                "height",
                Property::float_range(0.2, 0.05, 0.5)
                    .with_label("Height")
                    .with_description("Keyboard height as a fraction of the video height"),
            ),
            (
                "first_key",
                Property::int_range(0, 0, NUM_KEYS - 1)
                    .with_label("First key")
                    .with_description("Index of the leftmost key shown"),
            ),
            (
                "last_key",
                Property::int_range(NUM_KEYS - 1, 0, NUM_KEYS - 1)
                    .with_label("Last key")
                    .with_description("Index of the rightmost key shown"),
            ),
            (
                "style",
                Property::choice(&["classic", "flat"], "classic").with_label("Style"),
            ),
        ]
    }

    fn attributes(&self) -> Vec<(&'static str, Value)> {
        vec![("num_keys", Value::Int(NUM_KEYS))]
    }
}

// ============ keyboard.reset ============

pub struct ResetKeyboard;

impl OperatorPlugin for ResetKeyboard {
    fn meta(&self) -> OperatorMeta {
        OperatorMeta {
            group: "keyboard",
            idname: "reset",
            label: "Reset keyboard",
            description: "Restore every keyboard setting to its default",
        }
    }

    fn execute(&self, video: &Video) -> Result<(), PvError> {
        video.group("keyboard")?.reset();
        Ok(())
    }
}

pub fn register(registry: &PluginRegistry) -> Result<(), PvError> {
    registry.register_property_group(KeyboardSettings)?;
    registry.register_operator(ResetKeyboard)?;
    Ok(())
}
