//! Piano Video Built-in Addons
//!
//! - `keyboard`: keyboard appearance settings and `keyboard.reset`
//! - `smoke`: particle settings, the `smoke_cache` data group, `smoke.step`
//!   and `smoke.clear_cache`
//! - `render`: export range settings and `render.start`

pub mod keyboard;
pub mod smoke;
pub mod render;

use pv_plugin::{AddonCatalog, AddonDef};

/// Add the built-in addons to a catalog
pub fn load_builtin_addons(catalog: AddonCatalog) -> AddonCatalog {
    catalog
        .with_addon(AddonDef::new("keyboard", "Piano keyboard settings", keyboard::register))
        .with_addon(AddonDef::new("smoke", "Smoke particles rising from played notes", smoke::register))
        .with_addon(AddonDef::new("render", "Queue video exports", render::register))
}

/// A catalog holding only the built-in addons
pub fn builtin_catalog() -> AddonCatalog {
    load_builtin_addons(AddonCatalog::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_plugin::{PluginRegistry, Video};

    #[test]
    fn test_load_builtin_addons() {
        let catalog = builtin_catalog();
        assert_eq!(catalog.names(), vec!["keyboard", "smoke", "render"]);

        let registry = PluginRegistry::new();
        for addon in catalog.iter() {
            (addon.register)(&registry).unwrap();
        }

        let video = Video::new(&registry);
        assert_eq!(video.group_names(), vec!["keyboard", "smoke", "render"]);
        assert_eq!(video.data_names(), vec!["smoke_cache", "render_state"]);
        assert!(registry.get_operator("smoke", "step").is_some());
        assert!(registry.get_operator("render", "start").is_some());
        assert!(registry.get_operator("keyboard", "reset").is_some());
    }
}
