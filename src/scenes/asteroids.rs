//! An asteroid field with an autopiloted ship.
//!
//! Per update:
//! 1. The autopilot may turn, thrust and fire.
//! 2. Every body moves by `velocity × dt` and wraps at the panel edges.
//! 3. Shots that touch an asteroid remove it; large and medium asteroids
//!    break into two of the next tier down.
//! 4. The field is topped up with large asteroids entering from an edge.
//!
//! The number of live bodies (ship included) never exceeds `max_bodies`.
//! A spawn that would go over is dropped, newest first: split children and
//! refills simply don't appear until something else is destroyed.
//!
//! The ship is never destroyed. When an asteroid touches it, the ship is put
//! back at the center with zero velocity and ignores collisions for a short
//! grace period.

use super::{Scene, SceneContext, SceneEntry, SceneOptions, Vec2, parse_options};
use crate::Color;
use crate::canvas::Canvas;
use crate::config::SceneConfig;
use rand::Rng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::f32::consts::TAU;

pub const NAME: &str = "asteroids";

const SHIP_COLOR: Color = Color::new(0, 255, 255);
const ASTEROID_COLOR: Color = Color::new(220, 220, 220);
const PROJECTILE_COLOR: Color = Color::new(255, 255, 200);

const SHIP_SIZE: f32 = 6.0;
const SHIP_RADIUS: f32 = 3.0;
const SHOT_LENGTH: f32 = 4.0;
const RESPAWN_GRACE: f32 = 2.0;

// ── Bodies ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeTier {
    Large,
    Medium,
    Small,
}

impl SizeTier {
    pub fn radius(self) -> f32 {
        match self {
            SizeTier::Large => 14.0,
            SizeTier::Medium => 9.0,
            SizeTier::Small => 5.0,
        }
    }

    fn outline_points(self) -> usize {
        match self {
            SizeTier::Large => 8,
            SizeTier::Medium => 7,
            SizeTier::Small => 6,
        }
    }

    fn speed_range(self) -> std::ops::Range<f32> {
        match self {
            SizeTier::Large => 10.0..20.0,
            SizeTier::Medium => 20.0..35.0,
            SizeTier::Small => 35.0..50.0,
        }
    }

    /// The tier a destroyed asteroid splits into, if any.
    pub fn smaller(self) -> Option<SizeTier> {
        match self {
            SizeTier::Large => Some(SizeTier::Medium),
            SizeTier::Medium => Some(SizeTier::Small),
            SizeTier::Small => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Ship,
    Asteroid(SizeTier),
    Projectile,
}

/// Anything that moves on the field.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    pub kind: BodyKind,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Radians, 0 pointing up. For asteroids this is the spin angle.
    pub heading: f32,
    pub radius: f32,
    /// Seconds left before a projectile fizzles.
    pub lifetime: Option<f32>,
    spin: f32,
    outline: Vec<Vec2>,
}

impl Body {
    fn ship(pos: Vec2) -> Self {
        Self {
            kind: BodyKind::Ship,
            pos,
            vel: Vec2::ZERO,
            heading: 0.0,
            radius: SHIP_RADIUS,
            lifetime: None,
            spin: 0.0,
            outline: Vec::new(),
        }
    }

    fn asteroid(tier: SizeTier, pos: Vec2, vel: Vec2, rng: &mut StdRng) -> Self {
        let points = tier.outline_points();
        let jitter = 15f32.to_radians();
        let outline = (0..points)
            .map(|i| {
                let angle = TAU / points as f32 * i as f32 + rng.gen_range(-jitter..jitter);
                let radius = tier.radius() * rng.gen_range(0.7..1.0);
                Vec2::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect();

        Self {
            kind: BodyKind::Asteroid(tier),
            pos,
            vel,
            heading: 0.0,
            radius: tier.radius(),
            lifetime: None,
            spin: rng.gen_range(-90f32..90.0).to_radians(),
            outline,
        }
    }

    fn projectile(pos: Vec2, vel: Vec2, heading: f32, lifetime: f32) -> Self {
        Self {
            kind: BodyKind::Projectile,
            pos,
            vel,
            heading,
            radius: 0.0,
            lifetime: Some(lifetime),
            spin: 0.0,
            outline: Vec::new(),
        }
    }

    pub fn tier(&self) -> Option<SizeTier> {
        match self.kind {
            BodyKind::Asteroid(tier) => Some(tier),
            _ => None,
        }
    }

    /// Points of a local-space shape rotated by the heading and placed at `pos`.
    fn place(&self, shape: &[Vec2]) -> Vec<(i32, i32)> {
        shape
            .iter()
            .map(|&p| (p.rotated(self.heading) + self.pos).to_pixel())
            .collect()
    }
}

/// Move a body by `vel × dt` and wrap it onto the torus.
fn integrate(body: &mut Body, dt: f32, width: f32, height: f32) {
    body.pos = (body.pos + body.vel * dt).wrapped(width, height);
    body.heading = (body.heading + body.spin * dt).rem_euclid(TAU);
    if let Some(lifetime) = body.lifetime.as_mut() {
        *lifetime -= dt;
    }
}

// ── Options ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AsteroidsOptions {
    /// Large asteroids kept on the field.
    pub num_asteroids: usize,
    /// Cap on live bodies, ship included.
    pub max_bodies: usize,
    pub max_projectiles: usize,
    /// Seconds between autopilot decisions.
    pub action_interval: f32,
    pub thrust_chance: f64,
    pub rotate_chance: f64,
    /// Degrees turned per rotate decision.
    pub turn_step: f32,
    /// Acceleration while thrusting, px/s².
    pub thrust: f32,
    pub max_speed: f32,
    /// Velocity decay rate per second.
    pub drag: f32,
    /// Seconds before the next shot is considered.
    pub fire_interval: f32,
    pub fire_chance: f64,
    pub muzzle_speed: f32,
    pub projectile_lifetime: f32,
    /// Speed added to each split child, px/s.
    pub split_speed_boost: f32,
}

impl Default for AsteroidsOptions {
    fn default() -> Self {
        Self {
            num_asteroids: 5,
            max_bodies: 32,
            max_projectiles: 6,
            action_interval: 1.0,
            thrust_chance: 0.7,
            rotate_chance: 0.5,
            turn_step: 30.0,
            thrust: 100.0,
            max_speed: 80.0,
            drag: 1.5,
            fire_interval: 0.8,
            fire_chance: 0.6,
            muzzle_speed: 120.0,
            projectile_lifetime: 1.5,
            split_speed_boost: 10.0,
        }
    }
}

impl SceneOptions for AsteroidsOptions {
    fn check(&self) -> Result<(), String> {
        if self.num_asteroids == 0 {
            return Err("num_asteroids must be at least 1".to_string());
        }
        if self.num_asteroids + 1 > self.max_bodies {
            return Err(format!(
                "max_bodies ({}) must leave room for the ship and {} asteroids",
                self.max_bodies, self.num_asteroids
            ));
        }
        for (name, chance) in [
            ("thrust_chance", self.thrust_chance),
            ("rotate_chance", self.rotate_chance),
            ("fire_chance", self.fire_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(format!("{name} must be 0.0-1.0, got {chance}"));
            }
        }
        for (name, value) in [
            ("action_interval", self.action_interval),
            ("max_speed", self.max_speed),
            ("fire_interval", self.fire_interval),
            ("projectile_lifetime", self.projectile_lifetime),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{name} must be positive, got {value}"));
            }
        }
        for (name, value) in [
            ("turn_step", self.turn_step),
            ("thrust", self.thrust),
            ("drag", self.drag),
            ("muzzle_speed", self.muzzle_speed),
            ("split_speed_boost", self.split_speed_boost),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(format!("{name} must be >= 0, got {value}"));
            }
        }
        Ok(())
    }
}

pub fn entry() -> SceneEntry {
    SceneEntry {
        validate: |config| parse_options::<AsteroidsOptions>(config).map(|_| ()),
        build: |ctx, config: &SceneConfig| {
            let options = parse_options(config)?;
            Ok(Box::new(AsteroidsScene::new(*ctx, options)))
        },
    }
}

// ── Scene ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Autopilot {
    action_timer: f32,
    thrust_timer: f32,
    fire_timer: f32,
    grace: f32,
    thrusting: bool,
}

pub struct AsteroidsScene {
    ctx: SceneContext,
    options: AsteroidsOptions,
    ship: Body,
    autopilot: Autopilot,
    asteroids: Vec<Body>,
    projectiles: Vec<Body>,
    /// Seconds since the scene started, drives the flame flicker.
    clock: f32,
    ship_hits: u64,
    dropped_spawns: u64,
    rng: StdRng,
}

impl AsteroidsScene {
    pub fn new(ctx: SceneContext, options: AsteroidsOptions) -> Self {
        let mut scene = Self {
            ctx,
            ship: Body::ship(Self::center(&ctx)),
            autopilot: Autopilot::default(),
            asteroids: Vec::with_capacity(options.max_bodies),
            projectiles: Vec::with_capacity(options.max_projectiles),
            options,
            clock: 0.0,
            ship_hits: 0,
            dropped_spawns: 0,
            rng: ctx.rng(),
        };
        for _ in 0..scene.options.num_asteroids {
            scene.spawn_at_edge();
        }
        tracing::info!("AsteroidsScene loaded (asteroids={})", scene.asteroids.len());
        scene
    }

    fn center(ctx: &SceneContext) -> Vec2 {
        Vec2::new(ctx.panel.width() as f32 / 2.0, ctx.panel.height() as f32 / 2.0)
    }

    fn extent(&self) -> (f32, f32) {
        (self.ctx.panel.width() as f32, self.ctx.panel.height() as f32)
    }

    pub fn ship(&self) -> &Body {
        &self.ship
    }

    pub fn asteroids(&self) -> &[Body] {
        &self.asteroids
    }

    pub fn projectiles(&self) -> &[Body] {
        &self.projectiles
    }

    /// Ship, asteroids and projectiles currently alive.
    pub fn live_bodies(&self) -> usize {
        1 + self.asteroids.len() + self.projectiles.len()
    }

    pub fn ship_hits(&self) -> u64 {
        self.ship_hits
    }

    /// Spawns refused because the field was full.
    pub fn dropped_spawns(&self) -> u64 {
        self.dropped_spawns
    }

    fn has_room(&mut self) -> bool {
        if self.live_bodies() < self.options.max_bodies {
            return true;
        }
        if self.dropped_spawns == 0 {
            tracing::warn!(
                "AsteroidsScene: body cap of {} reached, dropping new spawns",
                self.options.max_bodies
            );
        }
        self.dropped_spawns += 1;
        false
    }

    fn spawn_asteroid(&mut self, tier: SizeTier, pos: Vec2, vel: Vec2) -> bool {
        if !self.has_room() {
            return false;
        }
        let asteroid = Body::asteroid(tier, pos, vel, &mut self.rng);
        self.asteroids.push(asteroid);
        true
    }

    /// A large asteroid drifting in from a random edge, away from the ship's start.
    fn spawn_at_edge(&mut self) -> bool {
        let (w, h) = self.extent();
        let pos = if self.rng.gen_bool(0.5) {
            let y = if self.rng.gen_bool(0.5) { 0.0 } else { h - 1.0 };
            Vec2::new(self.rng.gen_range(0.0..w), y)
        } else {
            let x = if self.rng.gen_bool(0.5) { 0.0 } else { w - 1.0 };
            Vec2::new(x, self.rng.gen_range(0.0..h))
        };
        let vel = self.random_velocity(SizeTier::Large.speed_range());
        self.spawn_asteroid(SizeTier::Large, pos, vel)
    }

    fn random_velocity(&mut self, speed: std::ops::Range<f32>) -> Vec2 {
        let heading = self.rng.gen_range(0.0..TAU);
        let speed = self.rng.gen_range(speed);
        Vec2::from_heading(heading) * speed
    }

    /// Remove asteroid `index` and split it. Returns how many children appeared.
    pub fn destroy_asteroid(&mut self, index: usize) -> usize {
        if index >= self.asteroids.len() {
            return 0;
        }
        let parent = self.asteroids.swap_remove(index);
        let Some(child_tier) = parent.tier().and_then(SizeTier::smaller) else {
            return 0;
        };

        let speed = parent.vel.length() + self.options.split_speed_boost;
        let mut spawned = 0;
        for _ in 0..2 {
            let heading = self.rng.gen_range(0.0..TAU);
            let vel = Vec2::from_heading(heading) * speed;
            if self.spawn_asteroid(child_tier, parent.pos, vel) {
                spawned += 1;
            }
        }
        tracing::debug!("Asteroid {:?} split into {} {:?}", parent.kind, spawned, child_tier);
        spawned
    }

    /// Fire from the ship's nose. Returns whether a shot was spawned.
    pub fn fire(&mut self) -> bool {
        if self.projectiles.len() >= self.options.max_projectiles || !self.has_room() {
            return false;
        }
        let dir = Vec2::from_heading(self.ship.heading);
        let shot = Body::projectile(
            self.ship.pos + dir * SHIP_SIZE,
            self.ship.vel + dir * self.options.muzzle_speed,
            self.ship.heading,
            self.options.projectile_lifetime,
        );
        self.projectiles.push(shot);
        true
    }

    fn steer(&mut self, dt: f32) {
        let pilot = &mut self.autopilot;
        pilot.action_timer += dt;
        if pilot.action_timer > self.options.action_interval {
            pilot.action_timer = 0.0;

            if self.rng.gen_bool(self.options.rotate_chance) {
                let direction = if self.rng.gen_bool(0.5) { -1.0 } else { 1.0 };
                let turn = direction * self.options.turn_step.to_radians();
                self.ship.heading = (self.ship.heading + turn).rem_euclid(TAU);
            }
            if self.rng.gen_bool(self.options.thrust_chance) {
                pilot.thrust_timer = self.rng.gen_range(0.8..1.5);
            }
        }

        pilot.thrusting = pilot.thrust_timer > 0.0;
        if pilot.thrusting {
            pilot.thrust_timer -= dt;
            let push = Vec2::from_heading(self.ship.heading) * (self.options.thrust * dt);
            self.ship.vel = self.ship.vel + push;
        }

        self.ship.vel = self.ship.vel * (-self.options.drag * dt).exp();
        let speed = self.ship.vel.length();
        if speed > self.options.max_speed {
            self.ship.vel = self.ship.vel * (self.options.max_speed / speed);
        }

        pilot.fire_timer += dt;
        if pilot.fire_timer > self.options.fire_interval
            && self.rng.gen_bool(self.options.fire_chance)
        {
            pilot.fire_timer = 0.0;
            self.fire();
        }
    }

    /// Shots against asteroids, then the ship against asteroids.
    fn resolve_collisions(&mut self) {
        let mut i = 0;
        while i < self.projectiles.len() {
            let shot = self.projectiles[i].pos;
            let hit = self
                .asteroids
                .iter()
                .position(|a| shot.distance(a.pos) <= a.radius);
            match hit {
                Some(target) => {
                    self.projectiles.swap_remove(i);
                    self.destroy_asteroid(target);
                }
                None => i += 1,
            }
        }

        if self.autopilot.grace > 0.0 {
            return;
        }
        let ship = self.ship.pos;
        let rammed = self
            .asteroids
            .iter()
            .any(|a| ship.distance(a.pos) <= a.radius + SHIP_RADIUS);
        if rammed {
            self.ship_hits += 1;
            self.ship.pos = Self::center(&self.ctx);
            self.ship.vel = Vec2::ZERO;
            self.autopilot.grace = RESPAWN_GRACE;
            tracing::debug!("Ship hit ({} so far), back to center", self.ship_hits);
        }
    }

    fn refill(&mut self) {
        let large = self
            .asteroids
            .iter()
            .filter(|a| a.tier() == Some(SizeTier::Large))
            .count();
        if large < self.options.num_asteroids && self.live_bodies() < self.options.max_bodies {
            self.spawn_at_edge();
        }
    }

    fn draw_ship(&self, canvas: &mut dyn Canvas) {
        let half = SHIP_SIZE / 2.0;
        let hull = [
            Vec2::new(0.0, -SHIP_SIZE),
            Vec2::new(-half, half),
            Vec2::new(half, half),
        ];
        canvas.draw_polygon(&self.ship.place(&hull));

        if self.autopilot.thrusting {
            let flame = if (self.clock * 10.0) as u32 % 2 == 1 {
                SHIP_SIZE
            } else {
                SHIP_SIZE * 0.7
            };
            let third = SHIP_SIZE / 3.0;
            let points = self.ship.place(&[
                Vec2::new(-third, half),
                Vec2::new(0.0, half + flame),
                Vec2::new(third, half),
            ]);
            for pair in points.windows(2) {
                canvas.draw_line(pair[0].0, pair[0].1, pair[1].0, pair[1].1);
            }
        }
    }
}

impl Scene for AsteroidsScene {
    fn name(&self) -> &'static str {
        NAME
    }

    fn update(&mut self, dt: f32) {
        self.clock += dt;
        self.autopilot.grace = (self.autopilot.grace - dt).max(0.0);

        self.steer(dt);

        let (w, h) = self.extent();
        integrate(&mut self.ship, dt, w, h);
        for body in self.asteroids.iter_mut().chain(self.projectiles.iter_mut()) {
            integrate(body, dt, w, h);
        }
        self.projectiles
            .retain(|p| p.lifetime.is_some_and(|left| left > 0.0));

        self.resolve_collisions();
        self.refill();
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        canvas.set_color(self.ctx.pen(ASTEROID_COLOR));
        for asteroid in &self.asteroids {
            canvas.draw_polygon(&asteroid.place(&asteroid.outline));
        }

        canvas.set_color(self.ctx.pen(PROJECTILE_COLOR));
        for shot in &self.projectiles {
            let (x0, y0) = shot.pos.to_pixel();
            let (x1, y1) = (shot.pos + Vec2::from_heading(shot.heading) * SHOT_LENGTH).to_pixel();
            canvas.draw_line(x0, y0, x1, y1);
        }

        canvas.set_color(self.ctx.pen(SHIP_COLOR));
        self.draw_ship(canvas);
    }

    fn cleanup(&mut self) {
        tracing::info!("AsteroidsScene cleanup");
        self.asteroids = Vec::new();
        self.projectiles = Vec::new();
    }
}
