//! Scene manager: decides which scene runs and drives it each frame.
//!
//! The manager owns at most one live scene. Every [`tick`](SceneManager::tick)
//! it looks at the display mode it was given and either:
//! - goes idle (mode `off`, or nothing eligible for this mode),
//! - switches to another scene (mode changed, duration expired, or a skip
//!   was requested), or
//! - keeps updating and rendering the current one.
//!
//! A switch is atomic from the caller's side: the outgoing scene's `cleanup`
//! finishes before the incoming scene is built.
//!
//! ## Rust concepts
//! - `Option<Box<dyn Scene>>` for "maybe one scene of any kind"
//! - `Option::take()` to move the old scene out before dropping it
//! - Seeded `StdRng` so a fixed seed replays the same scene sequence

use crate::PanelConfig;
use crate::canvas::Canvas;
use crate::config::{Config, SceneConfig, SceneSelection};
use crate::error::ConfigError;
use crate::mode::DisplayMode;
use crate::scenes::{Scene, SceneContext, SceneRegistry};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::Serialize;

/// Indexes of the configured scenes allowed to run in `mode`, in config order.
///
/// Empty when the panel is off.
pub fn select_candidates(scenes: &[SceneConfig], mode: DisplayMode) -> Vec<usize> {
    scenes
        .iter()
        .enumerate()
        .filter(|(_, scene)| scene.affinity.allows(mode))
        .map(|(i, _)| i)
        .collect()
}

/// What a tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was drawn; the frame stays black.
    Idle,
    /// The scene at config index `index` was updated and rendered.
    Rendered { index: usize, switched: bool },
}

/// Status of the running scene, for logs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneInfo {
    /// Index into the configured scene list.
    pub index: usize,
    pub name: &'static str,
    /// Seconds since the scene started.
    pub elapsed: f32,
    /// Seconds until the duration timer switches scenes.
    pub remaining: f32,
    pub mode: DisplayMode,
}

struct ActiveScene {
    index: usize,
    scene: Box<dyn Scene>,
}

pub struct SceneManager {
    registry: SceneRegistry,
    scenes: Vec<SceneConfig>,
    selection: SceneSelection,
    scene_duration: f32,
    dim_factor: f32,
    panel: PanelConfig,
    rng: StdRng,

    active: Option<ActiveScene>,
    /// Config index of the last scene that ran, kept across idle periods so
    /// sequential order resumes where it left off.
    last_index: Option<usize>,
    elapsed: f32,
    mode: Option<DisplayMode>,
    candidates: Vec<usize>,
    skip_requested: bool,
}

impl SceneManager {
    /// Check every configured scene against the registry and get ready to run.
    ///
    /// Unknown scene names and bad options fail here, not on first use.
    pub fn new(
        config: &Config,
        panel: PanelConfig,
        registry: SceneRegistry,
    ) -> Result<Self, ConfigError> {
        if panel.rows == 0 || panel.cols == 0 {
            return Err(ConfigError::InvalidValue {
                field: "panel",
                reason: format!("{}x{} has no pixels", panel.cols, panel.rows),
            });
        }
        if config.scenes.is_empty() {
            return Err(ConfigError::NoScenes);
        }
        for scene in &config.scenes {
            registry.validate(scene)?;
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::info!(
            "SceneManager ready: {} scenes, {:?} selection, {}s each",
            config.scenes.len(),
            config.scene_selection,
            config.scene_duration
        );

        Ok(Self {
            registry,
            scenes: config.scenes.clone(),
            selection: config.scene_selection,
            scene_duration: config.scene_duration,
            dim_factor: config.night_mode_dim_factor,
            panel,
            rng,
            active: None,
            last_index: None,
            elapsed: 0.0,
            mode: None,
            candidates: Vec::new(),
            skip_requested: false,
        })
    }

    /// Advance one frame under `mode`, drawing onto `canvas`.
    ///
    /// The caller clears the canvas first. Never fails: a scene that can't be
    /// built is logged and the frame stays idle.
    pub fn tick(&mut self, dt: f32, mode: DisplayMode, canvas: &mut dyn Canvas) -> TickOutcome {
        let mode_changed = self.mode != Some(mode);
        if mode_changed {
            self.candidates = select_candidates(&self.scenes, mode);
            self.mode = Some(mode);
        }

        if mode == DisplayMode::Off {
            if mode_changed {
                tracing::info!("Display off, releasing scene");
            }
            self.release();
            return TickOutcome::Idle;
        }

        if self.candidates.is_empty() {
            if mode_changed {
                tracing::warn!("No scenes eligible in {} mode, staying dark", mode);
            }
            self.release();
            return TickOutcome::Idle;
        }

        let expired = self.elapsed >= self.scene_duration;
        let switched = mode_changed || expired || self.skip_requested || self.active.is_none();
        if switched {
            self.skip_requested = false;
            self.switch(mode);
        }

        let Some(active) = self.active.as_mut() else {
            return TickOutcome::Idle;
        };
        active.scene.update(dt);
        active.scene.render(canvas);
        self.elapsed += dt;

        TickOutcome::Rendered {
            index: active.index,
            switched,
        }
    }

    /// Move on to the next scene on the following tick.
    pub fn skip(&mut self) {
        self.skip_requested = true;
    }

    pub fn scene_info(&self) -> Option<SceneInfo> {
        let active = self.active.as_ref()?;
        Some(SceneInfo {
            index: active.index,
            name: active.scene.name(),
            elapsed: self.elapsed,
            remaining: (self.scene_duration - self.elapsed).max(0.0),
            mode: self.mode?,
        })
    }

    /// Config indexes eligible under the current mode.
    pub fn candidates(&self) -> &[usize] {
        &self.candidates
    }

    /// Pick the config index to run next among the current candidates.
    fn next_index(&mut self) -> usize {
        let candidates = &self.candidates;
        match self.selection {
            SceneSelection::Sequential => self
                .last_index
                .and_then(|last| candidates.iter().copied().find(|&i| i > last))
                .unwrap_or(candidates[0]),
            SceneSelection::Random => {
                let choices: Vec<usize> = candidates
                    .iter()
                    .copied()
                    .filter(|&i| candidates.len() == 1 || Some(i) != self.last_index)
                    .collect();
                choices[self.rng.gen_range(0..choices.len())]
            }
        }
    }

    fn switch(&mut self, mode: DisplayMode) {
        let index = self.next_index();
        self.release();

        let ctx = SceneContext::new(
            self.panel,
            mode.category().unwrap_or_default(),
            self.dim_factor,
            self.rng.next_u64(),
        );
        let config = &self.scenes[index];
        match self.registry.build(&ctx, config) {
            Ok(scene) => {
                self.active = Some(ActiveScene { index, scene });
                self.last_index = Some(index);
                self.elapsed = 0.0;
                if let Some(info) = self.scene_info() {
                    match serde_json::to_string(&info) {
                        Ok(json) => tracing::info!("Switched scene: {}", json),
                        Err(_) => tracing::info!("Switched scene: {}", info.name),
                    }
                }
            }
            Err(e) => {
                tracing::error!("Failed to build scene {}: {}", config.scene, e);
                self.last_index = Some(index);
            }
        }
    }

    /// Clean up and drop the running scene, if any.
    fn release(&mut self) {
        if let Some(mut old) = self.active.take() {
            old.scene.cleanup();
        }
        self.elapsed = 0.0;
    }
}
