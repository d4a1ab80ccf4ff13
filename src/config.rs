//! Configuration: a JSON file on disk, validated into a [`Config`] value.
//!
//! Loading happens in two steps. `serde` fills a [`ConfigFile`] that mirrors
//! the file layout (every field optional, strings where the user types
//! names), then [`Config::try_from`] checks ranges and resolves names into
//! typed values. Any problem is a [`ConfigError`] raised at start-up.
//!
//! The resulting `Config` is passed by reference into the scene manager and
//! scene constructors; nothing reads configuration ambiently.
//!
//! ```json
//! {
//!   "scene_duration": 30,
//!   "scene_selection": "sequential",
//!   "mode_schedule": { "9": "normal", "17": "dark", "23": "off" },
//!   "night_mode_dim_factor": 0.3,
//!   "scenes": [
//!     { "scene": "cube", "options": { "num_cubes": 3 }, "affinity": "night" },
//!     { "scene": "tetris" }
//!   ]
//! }
//! ```

use crate::error::ConfigError;
use crate::mode::{Affinity, ModeSchedule};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SCENE_DURATION: f32 = 30.0;
const DEFAULT_DIM_FACTOR: f32 = 0.3;
const DEFAULT_BRIGHTNESS: u8 = 75;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 20;

/// How the next scene is picked when the current one expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneSelection {
    /// Next eligible scene in configured order, wrapping.
    #[default]
    Sequential,
    /// Uniform pick, never the same scene twice in a row when there's a choice.
    Random,
}

impl FromStr for SceneSelection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(SceneSelection::Sequential),
            "random" => Ok(SceneSelection::Random),
            other => Err(ConfigError::UnsupportedSelection(other.to_string())),
        }
    }
}

/// One entry of the scene list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    /// Registered scene identifier (`cube`, `tetris`, `asteroids`).
    pub scene: String,
    /// Positional arguments, passed through to the constructor.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Keyword options, checked against the scene's option schema.
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub affinity: Affinity,
}

impl SceneConfig {
    pub fn new(scene: &str) -> Self {
        Self {
            scene: scene.to_string(),
            args: Vec::new(),
            options: Map::new(),
            affinity: Affinity::Any,
        }
    }

    /// Replace the options with a JSON object; other values are ignored.
    pub fn with_options(mut self, options: Value) -> Self {
        if let Value::Object(map) = options {
            self.options = map;
        }
        self
    }

    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }
}

/// Clock overlay drawn on top of every scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HudConfig {
    pub enabled: bool,
    /// BDF font name, looked up in the fonts directory.
    pub font: String,
    pub x: i32,
    pub y: i32,
    pub color: (u8, u8, u8),
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            font: "6x13".to_string(),
            x: 2,
            y: 12,
            color: (255, 255, 255),
        }
    }
}

/// The config file exactly as written on disk.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub scene_duration: f32,
    pub scene_selection: String,
    pub mode_schedule: BTreeMap<String, String>,
    pub night_mode_dim_factor: f32,
    pub brightness: u8,
    pub frame_interval_ms: u64,
    pub seed: Option<u64>,
    pub hud: HudConfig,
    pub scenes: Vec<SceneConfig>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let defaults = Config::default();
        Self {
            scene_duration: defaults.scene_duration,
            scene_selection: "sequential".to_string(),
            mode_schedule: defaults
                .mode_schedule
                .entries()
                .iter()
                .map(|(hour, mode)| (hour.to_string(), mode.to_string()))
                .collect(),
            night_mode_dim_factor: defaults.night_mode_dim_factor,
            brightness: defaults.brightness,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            seed: None,
            hud: defaults.hud,
            scenes: defaults.scenes,
        }
    }
}

/// Validated configuration for the whole engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Seconds each scene runs before the manager moves on.
    pub scene_duration: f32,
    pub scene_selection: SceneSelection,
    pub mode_schedule: ModeSchedule,
    /// Multiplier applied to every scene color in dark mode.
    pub night_mode_dim_factor: f32,
    /// Panel-wide brightness, 0-100.
    pub brightness: u8,
    pub frame_interval: Duration,
    /// Fixed seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
    pub hud: HudConfig,
    pub scenes: Vec<SceneConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scene_duration: DEFAULT_SCENE_DURATION,
            scene_selection: SceneSelection::Sequential,
            mode_schedule: ModeSchedule::default(),
            night_mode_dim_factor: DEFAULT_DIM_FACTOR,
            brightness: DEFAULT_BRIGHTNESS,
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
            seed: None,
            hud: HudConfig::default(),
            scenes: vec![
                SceneConfig::new("cube")
                    .with_options(serde_json::json!({ "num_cubes": 3 }))
                    .with_affinity(Affinity::Night),
                SceneConfig::new("tetris"),
                SceneConfig::new("asteroids")
                    .with_options(serde_json::json!({ "num_asteroids": 5 })),
            ],
        }
    }
}

impl Config {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(text)?;
        Self::try_from(file)
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self, Self::Error> {
        if !(file.scene_duration.is_finite() && file.scene_duration > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "scene_duration",
                reason: format!("{} is not a positive number of seconds", file.scene_duration),
            });
        }
        if !(0.0..=1.0).contains(&file.night_mode_dim_factor) {
            return Err(ConfigError::InvalidValue {
                field: "night_mode_dim_factor",
                reason: format!("{} is outside 0.0-1.0", file.night_mode_dim_factor),
            });
        }
        if file.brightness > 100 {
            return Err(ConfigError::InvalidValue {
                field: "brightness",
                reason: format!("{} is above 100", file.brightness),
            });
        }
        if file.frame_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "frame_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if file.scenes.is_empty() {
            return Err(ConfigError::NoScenes);
        }

        Ok(Self {
            scene_duration: file.scene_duration,
            scene_selection: file.scene_selection.parse()?,
            mode_schedule: ModeSchedule::parse(&file.mode_schedule)?,
            night_mode_dim_factor: file.night_mode_dim_factor,
            brightness: file.brightness,
            frame_interval: Duration::from_millis(file.frame_interval_ms),
            seed: file.seed,
            hud: file.hud,
            scenes: file.scenes,
        })
    }
}
