//! Spinning wireframe cubes flying toward the viewer.
//!
//! Each cube has its own orientation (one angle per axis) and angular
//! velocity. Every frame the eight corners are rotated X → Y → Z, pushed
//! through a perspective divide and joined by the twelve edges. The field of
//! view grows over time so the cube seems to approach; once it passes a
//! random limit the cube is replaced by a fresh, distant one.

use super::{Scene, SceneContext, SceneEntry, SceneOptions, parse_options};
use crate::Color;
use crate::canvas::Canvas;
use crate::config::SceneConfig;
use rand::Rng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::f32::consts::TAU;

pub const NAME: &str = "cube";

/// Corners of a cube with edge length 2, centered on the origin.
const VERTICES: [[f32; 3]; 8] = [
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, -1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
];

const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// A rotated corner is at most √3 from the center; the camera must sit
/// further back than that so `distance + z` stays positive.
const MIN_DISTANCE: f32 = 2.25;

const SPAWN_FOV: f32 = 8.0;
const MAX_CUBES: usize = 16;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CubeOptions {
    pub num_cubes: usize,
    /// Camera distance from each cube's center.
    pub distance: f32,
    /// Field-of-view growth per second.
    pub zoom_rate: f32,
    /// Hue advance in degrees per second.
    pub hue_rate: f32,
    /// Radians per second around X, Y, Z. Random per cube when absent.
    pub angular_velocity: Option<[f32; 3]>,
    /// Starting angles. Random per cube when absent.
    pub initial_orientation: Option<[f32; 3]>,
}

impl Default for CubeOptions {
    fn default() -> Self {
        Self {
            num_cubes: 3,
            distance: 8.0,
            zoom_rate: 90.0,
            hue_rate: 60.0,
            angular_velocity: None,
            initial_orientation: None,
        }
    }
}

impl SceneOptions for CubeOptions {
    fn check(&self) -> Result<(), String> {
        if self.num_cubes == 0 || self.num_cubes > MAX_CUBES {
            return Err(format!("num_cubes must be 1-{MAX_CUBES}, got {}", self.num_cubes));
        }
        if !(self.distance.is_finite() && self.distance >= MIN_DISTANCE) {
            return Err(format!("distance must be at least {MIN_DISTANCE}, got {}", self.distance));
        }
        if !(self.zoom_rate.is_finite() && self.zoom_rate >= 0.0) {
            return Err(format!("zoom_rate must be >= 0, got {}", self.zoom_rate));
        }
        if !self.hue_rate.is_finite() {
            return Err("hue_rate must be finite".to_string());
        }
        Ok(())
    }
}

pub fn entry() -> SceneEntry {
    SceneEntry {
        validate: |config| parse_options::<CubeOptions>(config).map(|_| ()),
        build: |ctx, config: &SceneConfig| {
            let options = parse_options(config)?;
            Ok(Box::new(CubeScene::new(*ctx, options)))
        },
    }
}

// ── Solid ────────────────────────────────────────────────────────────

/// One cube: topology is the shared constant tables, state is its own.
#[derive(Clone, Debug, PartialEq)]
pub struct WireframeSolid {
    /// Rotation around X, Y, Z in `[0, 2π)`.
    pub orientation: [f32; 3],
    pub angular_velocity: [f32; 3],
    /// Screen position of the cube's center.
    pub anchor: (f32, f32),
    pub fov: f32,
    fov_limit: f32,
    hue_offset: f32,
}

impl WireframeSolid {
    fn advance(&mut self, dt: f32) {
        for (angle, speed) in self.orientation.iter_mut().zip(self.angular_velocity) {
            *angle = (*angle + speed * dt).rem_euclid(TAU);
            if *angle >= TAU {
                *angle = 0.0;
            }
        }
    }

    fn rotate(&self, [x, y, z]: [f32; 3]) -> [f32; 3] {
        let (sin_x, cos_x) = self.orientation[0].sin_cos();
        let (sin_y, cos_y) = self.orientation[1].sin_cos();
        let (sin_z, cos_z) = self.orientation[2].sin_cos();

        let (y, z) = (y * cos_x - z * sin_x, y * sin_x + z * cos_x);
        let (x, z) = (x * cos_y - z * sin_y, x * sin_y + z * cos_y);
        let (x, y) = (x * cos_z - y * sin_z, x * sin_z + y * cos_z);
        [x, y, z]
    }

    /// Screen coordinates of the eight corners.
    pub fn project(&self, distance: f32) -> [(i32, i32); 8] {
        let mut points = [(0, 0); 8];
        for (point, &vertex) in points.iter_mut().zip(VERTICES.iter()) {
            let [x, y, z] = self.rotate(vertex);
            let factor = self.fov / (distance + z);
            *point = (
                (x * factor + self.anchor.0) as i32,
                (-y * factor + self.anchor.1) as i32,
            );
        }
        points
    }
}

// ── Scene ────────────────────────────────────────────────────────────

pub struct CubeScene {
    ctx: SceneContext,
    options: CubeOptions,
    solids: Vec<WireframeSolid>,
    hue: f32,
    rng: StdRng,
}

impl CubeScene {
    pub fn new(ctx: SceneContext, options: CubeOptions) -> Self {
        let mut scene = Self {
            ctx,
            rng: ctx.rng(),
            solids: Vec::with_capacity(options.num_cubes),
            hue: 0.0,
            options,
        };
        for i in 0..scene.options.num_cubes {
            let fov = scene.rng.gen_range(SPAWN_FOV..32.0);
            let solid = scene.spawn(i, fov);
            scene.solids.push(solid);
        }
        tracing::info!("CubeScene loaded with {} cubes", scene.solids.len());
        scene
    }

    fn spawn(&mut self, index: usize, fov: f32) -> WireframeSolid {
        let rng = &mut self.rng;
        let (w, h) = (self.ctx.panel.width() as f32, self.ctx.panel.height() as f32);
        let anchor = (random_coord(rng, w), random_coord(rng, h));
        let orientation = self
            .options
            .initial_orientation
            .map(|angles| angles.map(|a| a.rem_euclid(TAU)))
            .unwrap_or_else(|| {
                [rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU), rng.gen_range(0.0..TAU)]
            });
        let angular_velocity = self.options.angular_velocity.unwrap_or_else(|| {
            [rng.gen_range(0.4..1.5), rng.gen_range(0.4..1.5), rng.gen_range(0.4..1.5)]
        });

        WireframeSolid {
            orientation,
            angular_velocity,
            anchor,
            fov,
            fov_limit: rng.gen_range(250.0..600.0),
            hue_offset: index as f32 * 360.0 / self.options.num_cubes as f32,
        }
    }

    pub fn solids(&self) -> &[WireframeSolid] {
        &self.solids
    }

    /// Current hue of `solid`, degrees.
    fn hue_of(&self, solid: &WireframeSolid) -> u16 {
        (self.hue + solid.hue_offset).rem_euclid(360.0) as u16
    }
}

/// A coordinate at least 10 pixels from either edge, or the center on tiny panels.
fn random_coord(rng: &mut StdRng, extent: f32) -> f32 {
    if extent > 21.0 {
        rng.gen_range(10.0..extent - 10.0)
    } else {
        extent / 2.0
    }
}

impl Scene for CubeScene {
    fn name(&self) -> &'static str {
        NAME
    }

    fn update(&mut self, dt: f32) {
        self.hue = (self.hue + self.options.hue_rate * dt).rem_euclid(360.0);

        for i in 0..self.solids.len() {
            let solid = &mut self.solids[i];
            solid.advance(dt);
            solid.fov += self.options.zoom_rate * dt;

            if solid.fov > solid.fov_limit {
                let fresh = self.spawn(i, SPAWN_FOV);
                tracing::debug!("Cube {} passed the camera, respawning", i);
                self.solids[i] = fresh;
            }
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        for solid in &self.solids {
            let color = Color::from_hue(self.hue_of(solid));
            canvas.set_color(self.ctx.pen(color));

            let points = solid.project(self.options.distance);
            for &(a, b) in EDGES.iter() {
                let (x0, y0) = points[a];
                let (x1, y1) = points[b];
                canvas.draw_line(x0, y0, x1, y1);
            }
        }
    }

    fn cleanup(&mut self) {
        tracing::info!("CubeScene cleanup");
        self.solids = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PanelConfig;
    use crate::canvas::recording::RecordingCanvas;
    use crate::mode::ModeCategory;
    use pretty_assertions::assert_eq;

    fn ctx(category: ModeCategory) -> SceneContext {
        SceneContext::new(PanelConfig::default(), category, 0.3, 42)
    }

    fn still_options() -> CubeOptions {
        CubeOptions {
            num_cubes: 1,
            zoom_rate: 0.0,
            initial_orientation: Some([0.0, 0.0, 0.0]),
            angular_velocity: Some([1.0, 0.0, 0.0]),
            ..CubeOptions::default()
        }
    }

    #[test]
    fn one_second_at_one_radian_per_second() {
        let mut scene = CubeScene::new(ctx(ModeCategory::Day), still_options());
        scene.update(1.0);
        let orientation = scene.solids()[0].orientation;
        assert!((orientation[0] - 1.0).abs() < 1e-6);
        assert_eq!(orientation[1], 0.0);
        assert_eq!(orientation[2], 0.0);
    }

    #[test]
    fn orientation_wraps_at_full_turn() {
        let options = CubeOptions {
            angular_velocity: Some([4.0, -1.0, 0.0]),
            ..still_options()
        };
        let mut scene = CubeScene::new(ctx(ModeCategory::Day), options);
        scene.update(2.0);
        let orientation = scene.solids()[0].orientation;
        assert!((orientation[0] - (8.0 - TAU)).abs() < 1e-4);
        assert!((orientation[1] - (TAU - 2.0)).abs() < 1e-4);
        for angle in orientation {
            assert!((0.0..TAU).contains(&angle));
        }
    }

    #[test]
    fn render_draws_twelve_edges_per_cube() {
        let options = CubeOptions {
            num_cubes: 3,
            ..CubeOptions::default()
        };
        let scene = CubeScene::new(ctx(ModeCategory::Day), options);
        let mut canvas = RecordingCanvas::new(256, 64);
        scene.render(&mut canvas);
        assert_eq!(canvas.lines(), 36);
        assert_eq!(canvas.pens().len(), 3);
    }

    #[test]
    fn unrotated_cube_projects_symmetrically() {
        let scene = CubeScene::new(ctx(ModeCategory::Day), still_options());
        let solid = &scene.solids()[0];
        let points = solid.project(8.0);
        let (ax, ay) = (solid.anchor.0 as i32, solid.anchor.1 as i32);
        // front face (z = +1) is smaller than back face (z = -1)
        let front = (points[1].0 - points[0].0).abs();
        let back = (points[2].0 - points[3].0).abs();
        assert!(front <= back);
        for (x, y) in points {
            assert!((x - ax).abs() <= 10 && (y - ay).abs() <= 10);
        }
    }

    #[test]
    fn zoomed_past_limit_respawns_far_away() {
        let options = CubeOptions {
            zoom_rate: 1000.0,
            ..still_options()
        };
        let mut scene = CubeScene::new(ctx(ModeCategory::Day), options);
        scene.update(1.0);
        assert_eq!(scene.solids()[0].fov, SPAWN_FOV);
    }

    #[test]
    fn dark_mode_scales_every_pen() {
        let day = CubeScene::new(ctx(ModeCategory::Day), CubeOptions::default());
        let night = CubeScene::new(ctx(ModeCategory::Night), CubeOptions::default());

        let mut day_canvas = RecordingCanvas::new(256, 64);
        let mut night_canvas = RecordingCanvas::new(256, 64);
        day.render(&mut day_canvas);
        night.render(&mut night_canvas);

        let expected: Vec<Color> = day_canvas.pens().iter().map(|c| c.scale(0.3)).collect();
        assert_eq!(night_canvas.pens(), expected);
    }

    #[test]
    fn distance_too_close_is_rejected() {
        let options = CubeOptions {
            distance: 1.5,
            ..CubeOptions::default()
        };
        assert!(options.check().is_err());
    }

    #[test]
    fn zero_cubes_is_rejected() {
        let options = CubeOptions {
            num_cubes: 0,
            ..CubeOptions::default()
        };
        assert!(options.check().is_err());
    }

    #[test]
    fn cleanup_drops_solids() {
        let mut scene = CubeScene::new(ctx(ModeCategory::Day), CubeOptions::default());
        scene.cleanup();
        assert!(scene.solids().is_empty());
    }
}
