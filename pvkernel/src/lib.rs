//! Piano Video Kernel
//!
//! Owns the plugin registry, loads addons into it, and creates videos.

pub mod config;
pub mod manifest;
pub mod startup;

pub use config::{ConfigError, KernelConfig, VideoDefaults};
pub use manifest::{AddonManifest, ManifestError, MANIFEST_FILE};
pub use startup::{addon_name, discover_addons, AddonFailure, AddonLoader, AddonReport, LoadedAddon, SkippedAddon};

use pv_core::PvError;
use pv_plugin::{AddonCatalog, PluginRegistry, RegistryDescription, Video};
use tracing::info;

/// Main Piano Video engine
pub struct Kernel {
    registry: PluginRegistry,
    loader: AddonLoader,
    config: KernelConfig,
}

impl Kernel {
    pub fn new(config: KernelConfig, catalog: AddonCatalog) -> Self {
        Self {
            registry: PluginRegistry::new(),
            loader: AddonLoader::new(catalog),
            config,
        }
    }

    /// A kernel whose catalog holds the built-in addons
    pub fn with_builtin_addons(config: KernelConfig) -> Self {
        Self::new(config, pv_addons::builtin_catalog())
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AddonCatalog {
        self.loader.catalog()
    }

    /// Catalog entries called so far
    pub fn loaded_addons(&self) -> &[String] {
        self.loader.called()
    }

    /// Load the configured `autoload` addons, then scan every addon
    /// directory. Failures are collected in the report, never returned.
    pub fn register_addons(&mut self) -> AddonReport {
        let mut report = self.loader.load_named(&self.config.autoload, &self.registry);
        report.merge(self.loader.load_dirs(&self.config.addon_paths, &self.registry));
        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "addons registered"
        );
        report
    }

    /// Load one catalog addon by name.
    pub fn load_addon(&mut self, name: &str) -> Result<(), PvError> {
        self.loader.invoke(name, name, None, &self.registry).map(|_| ())
    }

    /// A video using the configured defaults
    pub fn create_video(&self) -> Result<Video, PvError> {
        let defaults = &self.config.video;
        Video::with_settings(&self.registry, defaults.resolution, defaults.fps)
    }

    pub fn describe(&self) -> RegistryDescription {
        self.registry.describe()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::with_builtin_addons(KernelConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::{codes, Property, Value};
    use pv_plugin::{AddonDef, GroupMeta, PropertyGroupPlugin};
    use std::path::{Path, PathBuf};

    struct PitchSettings;

    impl PropertyGroupPlugin for PitchSettings {
        fn meta(&self) -> GroupMeta {
            GroupMeta { idname: "pitch", label: "Pitch", description: "Pitch display" }
        }

        fn properties(&self) -> Vec<(&'static str, Property)> {
            vec![("enabled", Property::bool(true))]
        }
    }

    fn register_pitch(registry: &PluginRegistry) -> Result<(), PvError> {
        registry.register_property_group(PitchSettings)
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pv-kernel-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_for(dirs: &[&Path]) -> KernelConfig {
        KernelConfig {
            addon_paths: dirs.iter().map(|d| d.to_path_buf()).collect(),
            ..KernelConfig::default()
        }
    }

    #[test]
    fn test_pitch_addon_end_to_end() {
        let dir = temp_dir("pitch");
        std::fs::create_dir(dir.join("pitch")).unwrap();

        let catalog = AddonCatalog::new().with_addon(AddonDef::new("pitch", "Pitch display", register_pitch));
        let mut kernel = Kernel::new(config_for(&[&dir]), catalog);
        let report = kernel.register_addons();
        assert!(report.is_ok());

        let video = kernel.create_video().unwrap();
        assert_eq!(video.get("pitch.enabled").unwrap(), Value::Bool(true));
        video.set("pitch.enabled", false).unwrap();
        assert_eq!(video.get("pitch.enabled").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_render_start_end_to_end() {
        let dir = temp_dir("render");
        std::fs::write(dir.join("render.addon"), "").unwrap();

        let mut kernel = Kernel::with_builtin_addons(config_for(&[&dir]));
        kernel.register_addons();
        let video = kernel.create_video().unwrap();

        let render = video.ops().group("render").unwrap();
        render.get("start").unwrap().call().unwrap();
        let jobs = video
            .data("render_state")
            .unwrap()
            .get::<Vec<pv_addons::render::RenderJob>>(pv_addons::render::JOBS_SLOT)
            .unwrap();
        assert_eq!(jobs.len(), 1);

        let err = render.get("stop").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_video_created_before_addons() {
        let mut kernel = Kernel::with_builtin_addons(config_for(&[]));
        let video = kernel.create_video().unwrap();
        assert!(video.group("smoke").is_err());

        kernel.load_addon("smoke").unwrap();
        assert_eq!(video.get("smoke.enabled").unwrap(), Value::Bool(true));
        assert_eq!(video.data_names(), vec!["smoke_cache"]);

        let err = kernel.load_addon("smoke").unwrap_err();
        assert_eq!(err.code, codes::ADDON_ALREADY_LOADED);
        assert_eq!(kernel.loaded_addons(), &["smoke".to_string()]);
    }

    #[test]
    fn test_autoload_and_defaults() {
        let config = KernelConfig {
            addon_paths: Vec::new(),
            autoload: vec!["keyboard".into(), "render".into()],
            video: VideoDefaults { resolution: (1280, 720), fps: 24.0 },
        };
        let mut kernel = Kernel::with_builtin_addons(config);
        let report = kernel.register_addons();
        assert_eq!(report.loaded_names(), vec!["keyboard", "render"]);

        let video = kernel.create_video().unwrap();
        assert_eq!(video.resolution(), (1280, 720));
        assert_eq!(video.fps(), 24.0);
        assert_eq!(video.group_names(), vec!["keyboard", "render"]);
        assert_eq!(kernel.describe().property_groups.len(), 2);
    }

    #[test]
    fn test_bad_video_defaults() {
        let mut config = KernelConfig::default();
        config.video.fps = 0.0;
        let kernel = Kernel::with_builtin_addons(config);
        assert!(kernel.create_video().is_err());
    }
}
