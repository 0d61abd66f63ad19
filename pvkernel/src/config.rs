//! Kernel configuration
//!
//! Read from a JSON file named by `PV_CONFIG`, then overridden by
//! `PV_ADDON_PATHS` (platform path list) and `PV_AUTOLOAD` (comma list).

use pv_core::PvError;
use pv_plugin::{DEFAULT_FPS, DEFAULT_RESOLUTION};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_ENV: &str = "PV_CONFIG";
pub const ADDON_PATHS_ENV: &str = "PV_ADDON_PATHS";
pub const AUTOLOAD_ENV: &str = "PV_AUTOLOAD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{var} is not valid unicode")]
    NotUnicode { var: &'static str },
}

impl From<ConfigError> for PvError {
    fn from(err: ConfigError) -> Self {
        match &err {
            ConfigError::Read { .. } => PvError::io(err.to_string()),
            ConfigError::Parse { .. } | ConfigError::NotUnicode { .. } => {
                PvError::invalid_value(err.to_string()).with_suggestion("check the PV_* environment variables")
            }
        }
    }
}

/// Settings for newly created videos
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoDefaults {
    pub resolution: (u32, u32),
    pub fps: f64,
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self { resolution: DEFAULT_RESOLUTION, fps: DEFAULT_FPS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Addon directories, scanned in order
    pub addon_paths: Vec<PathBuf>,
    /// Catalog addons loaded by name before any directory is scanned
    pub autoload: Vec<String>,
    pub video: VideoDefaults,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            addon_paths: vec![PathBuf::from("addons")],
            autoload: Vec::new(),
            video: VideoDefaults::default(),
        }
    }
}

impl KernelConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var_os(CONFIG_ENV),
            std::env::var_os(ADDON_PATHS_ENV),
            std::env::var_os(AUTOLOAD_ENV),
        )
    }

    /// Build a config from the raw values of the `PV_*` variables.
    pub fn from_vars(
        config: Option<OsString>,
        addon_paths: Option<OsString>,
        autoload: Option<OsString>,
    ) -> Result<Self, ConfigError> {
        let mut cfg = match config.filter(|c| !c.is_empty()) {
            Some(path) => Self::from_json_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Some(paths) = addon_paths.filter(|p| !p.is_empty()) {
            cfg.addon_paths = std::env::split_paths(&paths).collect();
        }

        if let Some(names) = autoload.filter(|n| !n.is_empty()) {
            let names = names.into_string().map_err(|_| ConfigError::NotUnicode { var: AUTOLOAD_ENV })?;
            cfg.autoload = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pv-config-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pv.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let cfg = KernelConfig::from_vars(None, None, None).unwrap();
        assert_eq!(cfg, KernelConfig::default());
        assert_eq!(cfg.video.resolution, (1920, 1080));
        assert_eq!(cfg.addon_paths, vec![PathBuf::from("addons")]);
    }

    #[test]
    fn test_json_file_partial() {
        let path = temp_file("partial", r#"{"video": {"fps": 60.0}, "autoload": ["smoke"]}"#);
        let cfg = KernelConfig::from_json_file(&path).unwrap();
        assert_eq!(cfg.video.fps, 60.0);
        assert_eq!(cfg.video.resolution, (1920, 1080));
        assert_eq!(cfg.autoload, vec!["smoke".to_string()]);
        assert_eq!(cfg.addon_paths, vec![PathBuf::from("addons")]);
    }

    #[test]
    fn test_env_overrides_file() {
        let path = temp_file("override", r#"{"addon_paths": ["from_file"]}"#);
        let paths = std::env::join_paths(["one", "two"]).unwrap();
        let cfg = KernelConfig::from_vars(
            Some(path.into_os_string()),
            Some(paths),
            Some(OsString::from("keyboard, render,")),
        )
        .unwrap();
        assert_eq!(cfg.addon_paths, vec![PathBuf::from("one"), PathBuf::from("two")]);
        assert_eq!(cfg.autoload, vec!["keyboard".to_string(), "render".to_string()]);
    }

    #[test]
    fn test_errors() {
        let missing = std::env::temp_dir().join("pv-config-does-not-exist.json");
        let err = KernelConfig::from_json_file(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert_eq!(PvError::from(err).kind(), pv_core::ErrorKind::Io);

        let bad = temp_file("bad", "{ not json");
        let err = KernelConfig::from_json_file(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(PvError::from(err).kind(), pv_core::ErrorKind::InvalidValue);
    }
}
