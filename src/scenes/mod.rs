//! Scenes: self-contained animations with an update / render / cleanup lifecycle.
//!
//! The manager only ever holds a `Box<dyn Scene>`. Which concrete scene it
//! gets is decided by name at construction time through a [`SceneRegistry`],
//! a table from scene identifier to a pair of plain functions (validate and
//! build). There is no reflection and no global list; the registry is a value
//! the manager owns.
//!
//! ## Rust concepts
//! - Trait objects for heterogeneous scenes behind one interface
//! - Function pointers (`fn(...) -> ...`) as a registration table
//! - `serde::de::DeserializeOwned` to turn a JSON object into typed options

pub mod asteroids;
pub mod cube;
pub mod tetris;

use crate::canvas::Canvas;
use crate::config::SceneConfig;
use crate::error::ConfigError;
use crate::mode::ModeCategory;
use crate::{Color, PanelConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// The lifecycle every scene implements.
///
/// `update` and `render` never fail. A scene that hits a dead end in its own
/// simulation (a blocked move, a full board) recovers on its own.
pub trait Scene {
    /// Registered identifier, for logs and status.
    fn name(&self) -> &'static str;

    /// Advance the simulation by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Draw the current state. The caller clears the canvas beforehand.
    fn render(&self, canvas: &mut dyn Canvas);

    /// Drop everything the scene allocated. Called once, before the next
    /// scene is built.
    fn cleanup(&mut self);
}

/// Everything a scene constructor needs besides its own options.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneContext {
    pub panel: PanelConfig,
    pub category: ModeCategory,
    /// Dark-mode color multiplier, 0.0-1.0.
    pub dim_factor: f32,
    /// Seed for the scene's private RNG.
    pub seed: u64,
}

impl SceneContext {
    pub fn new(panel: PanelConfig, category: ModeCategory, dim_factor: f32, seed: u64) -> Self {
        Self {
            panel,
            category,
            dim_factor,
            seed,
        }
    }

    /// The color to actually hand the canvas: scaled by the dim factor at
    /// night, untouched by day.
    pub fn pen(&self, color: Color) -> Color {
        match self.category {
            ModeCategory::Day => color,
            ModeCategory::Night => color.scale(self.dim_factor),
        }
    }

    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

/// Typed keyword options for one scene kind.
pub trait SceneOptions: DeserializeOwned {
    /// Range checks serde can't express.
    fn check(&self) -> Result<(), String>;
}

/// Deserialize and check a scene's options. Procedural scenes take no
/// positional arguments, so any are rejected here.
pub fn parse_options<T: SceneOptions>(config: &SceneConfig) -> Result<T, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidOptions {
        scene: config.scene.clone(),
        reason,
    };

    if !config.args.is_empty() {
        return Err(invalid(format!(
            "takes no positional arguments, got {}",
            config.args.len()
        )));
    }

    let options: T = serde_json::from_value(Value::Object(config.options.clone()))
        .map_err(|e| invalid(e.to_string()))?;
    options.check().map_err(invalid)?;
    Ok(options)
}

// ── Registry ─────────────────────────────────────────────────────────

pub type Validate = fn(&SceneConfig) -> Result<(), ConfigError>;
pub type Build = fn(&SceneContext, &SceneConfig) -> Result<Box<dyn Scene>, ConfigError>;

/// How to check and construct one scene kind.
#[derive(Clone, Copy)]
pub struct SceneEntry {
    pub validate: Validate,
    pub build: Build,
}

/// Scene identifier → constructor table.
#[derive(Clone, Default)]
pub struct SceneRegistry {
    entries: BTreeMap<&'static str, SceneEntry>,
}

impl SceneRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The scenes that ship with the clock.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(cube::NAME, cube::entry());
        registry.register(tetris::NAME, tetris::entry());
        registry.register(asteroids::NAME, asteroids::entry());
        registry
    }

    pub fn register(&mut self, name: &'static str, entry: SceneEntry) {
        self.entries.insert(name, entry);
    }

    pub fn get(&self, name: &str) -> Option<SceneEntry> {
        self.entries.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// Fail with the same error `build` would, without building anything.
    pub fn validate(&self, config: &SceneConfig) -> Result<(), ConfigError> {
        let entry = self
            .get(&config.scene)
            .ok_or_else(|| ConfigError::UnknownScene(config.scene.clone()))?;
        (entry.validate)(config)
    }

    pub fn build(
        &self,
        ctx: &SceneContext,
        config: &SceneConfig,
    ) -> Result<Box<dyn Scene>, ConfigError> {
        let entry = self
            .get(&config.scene)
            .ok_or_else(|| ConfigError::UnknownScene(config.scene.clone()))?;
        (entry.build)(ctx, config)
    }
}

// ── Shared geometry ──────────────────────────────────────────────────

/// A point or direction on the panel plane.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector for a heading in radians, 0 pointing up the panel.
    pub fn from_heading(heading: f32) -> Self {
        Self::new(heading.sin(), -heading.cos())
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    /// Rotate around the origin by `angle` radians.
    pub fn rotated(self, angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Wrap into `[0, w) × [0, h)`.
    pub fn wrapped(self, w: f32, h: f32) -> Self {
        // rem_euclid can round a tiny negative up to exactly `m`
        let wrap = |v: f32, m: f32| {
            let r = v.rem_euclid(m);
            if r >= m { 0.0 } else { r }
        };
        Self::new(wrap(self.x, w), wrap(self.y, h))
    }

    pub fn to_pixel(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::recording::RecordingCanvas;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_registry_knows_all_scenes() {
        let registry = SceneRegistry::builtin();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["asteroids", "cube", "tetris"]);
    }

    #[test]
    fn unknown_scene_fails_validation() {
        let registry = SceneRegistry::builtin();
        let err = registry.validate(&SceneConfig::new("plasma")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScene(s) if s == "plasma"));
    }

    #[test]
    fn positional_args_are_rejected() {
        let mut config = SceneConfig::new("cube");
        config.args.push(Value::from("images/bg1.png"));
        let err = SceneRegistry::builtin().validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { .. }));
    }

    #[test]
    fn unknown_option_is_rejected() {
        let config = SceneConfig::new("tetris").with_options(serde_json::json!({ "speed": 3 }));
        let err = SceneRegistry::builtin().validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOptions { scene, .. } if scene == "tetris"));
    }

    #[test]
    fn build_runs_every_builtin_scene() {
        let registry = SceneRegistry::builtin();
        let ctx = SceneContext::new(PanelConfig::default(), ModeCategory::Day, 0.3, 1);
        for name in ["cube", "tetris", "asteroids"] {
            let mut scene = registry.build(&ctx, &SceneConfig::new(name)).unwrap();
            assert_eq!(scene.name(), name);
            scene.update(0.05);
            let mut canvas = RecordingCanvas::new(256, 64);
            scene.render(&mut canvas);
            assert!(!canvas.ops.is_empty(), "{name} drew nothing");
            scene.cleanup();
        }
    }

    #[test]
    fn pen_dims_only_at_night() {
        let c = Color::new(200, 100, 40);
        let day = SceneContext::new(PanelConfig::default(), ModeCategory::Day, 0.5, 0);
        let night = SceneContext {
            category: ModeCategory::Night,
            ..day
        };
        assert_eq!(day.pen(c), c);
        assert_eq!(night.pen(c), Color::new(100, 50, 20));
    }

    #[test]
    fn heading_zero_points_up() {
        let v = Vec2::from_heading(0.0);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y + 1.0).abs() < 1e-6);
    }

    #[test]
    fn wrapped_is_toroidal() {
        let p = Vec2::new(-1.0, 65.0).wrapped(256.0, 64.0);
        assert_eq!(p, Vec2::new(255.0, 1.0));
    }
}
