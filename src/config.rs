//! Startup configuration, read from an optional JSON file.
//!
//! Every field has a default matching the stock demo scene, so a config file
//! only needs the values it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "TWINVIEW_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "twinview".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub antialias: bool,
    pub shadow_map_size: u32,
    pub shadow_bias: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            antialias: true,
            shadow_map_size: 512,
            shadow_bias: -0.005,
        }
    }
}

impl RendererConfig {
    pub fn sample_count(&self) -> u32 {
        if self.antialias {
            4
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl CameraConfig {
    pub fn primary() -> Self {
        Self {
            fov: 75.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 50.0,
            position: [0.0, 0.0, 6.0],
            target: [0.0, 0.0, 0.0],
        }
    }

    pub fn overview() -> Self {
        Self {
            fov: 60.0,
            aspect: 2.0,
            near: 0.1,
            far: 500.0,
            position: [40.0, 10.0, 30.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self::primary()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Directory the `images/...` asset paths are resolved against.
    pub asset_root: PathBuf,
    /// Spin rate of the textured cube, radians per second on X and Y.
    pub spin_rate: f32,
    pub fog_color: u32,
    pub ball_count: usize,
    /// Seed for ball placement; random when absent.
    pub ball_seed: Option<u64>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("."),
            spin_rate: 0.5,
            fog_color: crate::scene::material::css::LIGHT_BLUE,
            ball_count: 100,
            ball_seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
    pub primary_camera: CameraConfig,
    pub overview_camera: CameraConfig,
    pub scene: SceneConfig,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            renderer: RendererConfig::default(),
            primary_camera: CameraConfig::primary(),
            overview_camera: CameraConfig::overview(),
            scene: SceneConfig::default(),
        }
    }
}

impl DemoConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn load_config_from_file(path: &Path) -> Result<DemoConfig, ConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&json).map_err(|source| ConfigError::Json {
        path: path.display().to_string(),
        source,
    })
}

pub fn parse_config(json: &str) -> Result<DemoConfig, serde_json::Error> {
    serde_json::from_str(json)
}

/// Resolves the config path from the first CLI argument or the environment.
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
}

/// Loads the configured file, falling back to defaults when there is none or it is unreadable.
pub fn load_or_default() -> DemoConfig {
    let Some(path) = config_path_from_env() else {
        return DemoConfig::new();
    };
    match load_config_from_file(&path) {
        Ok(config) => {
            log::info!("Loaded configuration from {}", path.display());
            config
        }
        Err(err) => {
            log::warn!("{err}; using built-in defaults");
            DemoConfig::new()
        }
    }
}
