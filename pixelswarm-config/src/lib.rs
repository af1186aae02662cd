use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{fs, io};
use thiserror::Error;

// --- Error Type ---
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

// --- Enums for Choices ---
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializerType {
    #[default]
    Json,
    Binary,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SenderConfig {
    #[default]
    Stdio,
    File { path: PathBuf },
    Null,
    WebSocket {
        #[serde(default = "default_ws_host")]
        host: String,
        #[serde(default = "default_ws_port")]
        port: u16,
    },
}

/// Scripted pointer path used in place of a live input device.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PointerConfig {
    #[default]
    Idle,
    Fixed { x: f32, y: f32 },
    Orbit {
        center_x: f32,
        center_y: f32,
        radius: f32,
        #[serde(default = "default_period_frames")]
        period_frames: u32,
    },
    Waypoints {
        points: Vec<[f32; 2]>,
        #[serde(default = "default_frames_per_leg")]
        frames_per_leg: u32,
        #[serde(default)]
        looped: bool,
    },
}

// --- Configuration Sections ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ImageSettings {
    pub path: PathBuf,
    #[serde(default = "default_particle_size")]
    pub particle_size: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ViewportSettings {
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_padding")]
    pub padding: f32,
    #[serde(default = "default_background_color")]
    pub background_color: u32,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_repulsion_reset_distance")]
    pub repulsion_reset_distance: f32,
    #[serde(default = "default_repulsion_decay_per_frame")]
    pub repulsion_decay_per_frame: f32,
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,
    #[serde(default = "default_true")]
    pub fixed_timestep: bool,
    #[serde(default)]
    pub max_frames: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            seed: None,
            repulsion_reset_distance: default_repulsion_reset_distance(),
            repulsion_decay_per_frame: default_repulsion_decay_per_frame(),
            parallel_threshold: default_parallel_threshold(),
            fixed_timestep: true,
            max_frames: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TransportConfig {
    #[serde(default)]
    pub serializer: SerializerType,
    #[serde(default)]
    pub sender: SenderConfig,
    /// Send every n-th frame.
    #[serde(default = "default_update_frequency")]
    pub update_frequency: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            serializer: SerializerType::default(),
            sender: SenderConfig::default(),
            update_frequency: default_update_frequency(),
        }
    }
}

// Default values
fn default_particle_size() -> u32 { 1 }
fn default_padding() -> f32 { 10.0 }
fn default_background_color() -> u32 { 0xFFFFFF }
fn default_frame_rate() -> u32 { 60 }
fn default_repulsion_reset_distance() -> f32 { 80.0 }
fn default_repulsion_decay_per_frame() -> f32 { 1.5 }
fn default_parallel_threshold() -> usize { 4096 }
fn default_true() -> bool { true }
fn default_period_frames() -> u32 { 240 }
fn default_frames_per_leg() -> u32 { 60 }
fn default_update_frequency() -> u32 { 1 }
fn default_ws_host() -> String { "127.0.0.1".to_string() }
fn default_ws_port() -> u16 { 8080 }

// --- Top-Level Config Struct ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub image: ImageSettings,
    pub viewport: ViewportSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub pointer: PointerConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

// --- Loading Functions ---

/// Reads a config file, picking TOML for `.toml` paths and JSON otherwise.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => parse_toml(&content)?,
        _ => parse_json(&content)?,
    };
    validate(&config)?;
    Ok(config)
}

pub fn parse_json(content: &str) -> Result<Config, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

pub fn parse_toml(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let viewport = &config.viewport;
    if viewport.width <= 0.0 || viewport.height <= 0.0 {
        return Err(ConfigError::Validation("Viewport dimensions must be positive.".to_string()));
    }
    if viewport.padding < 0.0 {
        return Err(ConfigError::Validation("Padding cannot be negative.".to_string()));
    }
    if viewport.width - 2.0 * viewport.padding <= 0.0
        || viewport.height - 2.0 * viewport.padding <= 0.0
    {
        return Err(ConfigError::Validation(
            "Padding leaves no drawable area in the viewport.".to_string(),
        ));
    }
    if viewport.background_color > 0xFFFFFF {
        return Err(ConfigError::Validation(
            "Background color must be a packed 0xRRGGBB value.".to_string(),
        ));
    }

    if config.image.particle_size == 0 {
        return Err(ConfigError::Validation("Particle size must be at least 1.".to_string()));
    }

    let simulation = &config.simulation;
    if simulation.frame_rate == 0 {
        return Err(ConfigError::Validation("Frame rate cannot be zero.".to_string()));
    }
    if simulation.repulsion_reset_distance < 0.0 || simulation.repulsion_decay_per_frame < 0.0 {
        return Err(ConfigError::Validation(
            "Repulsion distances cannot be negative.".to_string(),
        ));
    }
    if simulation.max_frames == Some(0) {
        return Err(ConfigError::Validation("max_frames must be positive when set.".to_string()));
    }

    match &config.pointer {
        PointerConfig::Orbit { radius, period_frames, .. } => {
            if *period_frames == 0 {
                return Err(ConfigError::Validation("Orbit period cannot be zero.".to_string()));
            }
            if *radius < 0.0 {
                return Err(ConfigError::Validation("Orbit radius cannot be negative.".to_string()));
            }
        }
        PointerConfig::Waypoints { points, frames_per_leg, .. } => {
            if points.is_empty() {
                return Err(ConfigError::Validation("Waypoint list cannot be empty.".to_string()));
            }
            if *frames_per_leg == 0 {
                return Err(ConfigError::Validation("frames_per_leg cannot be zero.".to_string()));
            }
        }
        PointerConfig::Idle | PointerConfig::Fixed { .. } => {}
    }

    if config.transport.update_frequency == 0 {
        return Err(ConfigError::Validation("Update frequency must be greater than 0.".to_string()));
    }

    Ok(())
}
