//! Configuration errors.
//!
//! These are the only errors the engine reports. They all mean the
//! configuration is unusable, so they surface at start-up (config load or
//! `SceneManager::new`) instead of being defaulted away. Simulation hiccups
//! such as a blocked rotation are handled inside the scenes and never get here.

use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io(std::io::Error),
    /// The config file is not valid JSON for our schema.
    Parse(serde_json::Error),
    /// The mode schedule has no entries.
    EmptySchedule,
    /// A schedule key (or a queried hour) outside 0..=23.
    InvalidHour(String),
    /// Two schedule keys naming the same hour, like `"9"` and `"09"`.
    DuplicateHour(u32),
    /// A schedule value other than normal / dark / off.
    InvalidMode(String),
    /// A scene selection policy other than sequential / random.
    UnsupportedSelection(String),
    /// A scene identifier with no registered constructor.
    UnknownScene(String),
    /// Scene options that don't fit the scene's option schema.
    InvalidOptions { scene: String, reason: String },
    /// A top-level value out of range.
    InvalidValue { field: &'static str, reason: String },
    /// The scene list is empty.
    NoScenes,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read config: {e}"),
            ConfigError::Parse(e) => write!(f, "could not parse config: {e}"),
            ConfigError::EmptySchedule => write!(f, "mode schedule is empty"),
            ConfigError::InvalidHour(h) => write!(f, "invalid schedule hour {h:?} (expected 0-23)"),
            ConfigError::DuplicateHour(h) => write!(f, "schedule hour {h} appears more than once"),
            ConfigError::InvalidMode(m) => {
                write!(f, "invalid display mode {m:?} (expected normal, dark or off)")
            }
            ConfigError::UnsupportedSelection(s) => {
                write!(f, "unsupported scene selection {s:?} (expected sequential or random)")
            }
            ConfigError::UnknownScene(s) => write!(f, "unknown scene {s:?}"),
            ConfigError::InvalidOptions { scene, reason } => {
                write!(f, "invalid options for scene {scene:?}: {reason}")
            }
            ConfigError::InvalidValue { field, reason } => write!(f, "invalid {field}: {reason}"),
            ConfigError::NoScenes => write!(f, "no scenes configured"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}
