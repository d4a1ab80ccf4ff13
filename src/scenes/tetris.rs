//! A falling-block stacker that plays itself.
//!
//! One piece is active at a time. On every fall step it may jitter sideways
//! or rotate (randomly, and only if the move fits), then drops a row. When it
//! can't drop any further it is merged into the grid and the next piece
//! spawns at the top. Full rows are never cleared: the stack just grows until
//! the periodic reset wipes the board, or until a new piece has nowhere to
//! spawn, which also wipes it.
//!
//! ```text
//! Spawning ──► Falling ──(blocked below)──► Locking ──► Spawning
//!    │                                                     ▲
//!    └──(spawn blocked: reset grid, place again)───────────┘
//! ```

use super::{Scene, SceneContext, SceneEntry, SceneOptions, parse_options};
use crate::Color;
use crate::canvas::{Canvas, Fill};
use crate::config::SceneConfig;
use rand::Rng;
use rand::rngs::StdRng;
use serde::Deserialize;

pub const NAME: &str = "tetris";

// ── Pieces ───────────────────────────────────────────────────────────

/// The seven tetrominoes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

type Blocks = [(i32, i32); 4];

/// Cell offsets inside a 4×4 box for each rotation, clockwise.
const I_BLOCKS: [Blocks; 4] = [
    [(0, 1), (1, 1), (2, 1), (3, 1)],
    [(2, 0), (2, 1), (2, 2), (2, 3)],
    [(0, 2), (1, 2), (2, 2), (3, 2)],
    [(1, 0), (1, 1), (1, 2), (1, 3)],
];
const O_BLOCKS: [Blocks; 4] = [[(1, 0), (2, 0), (1, 1), (2, 1)]; 4];
const T_BLOCKS: [Blocks; 4] = [
    [(1, 0), (0, 1), (1, 1), (2, 1)],
    [(1, 0), (1, 1), (2, 1), (1, 2)],
    [(0, 1), (1, 1), (2, 1), (1, 2)],
    [(1, 0), (0, 1), (1, 1), (1, 2)],
];
const S_BLOCKS: [Blocks; 4] = [
    [(1, 0), (2, 0), (0, 1), (1, 1)],
    [(1, 0), (1, 1), (2, 1), (2, 2)],
    [(1, 1), (2, 1), (0, 2), (1, 2)],
    [(0, 0), (0, 1), (1, 1), (1, 2)],
];
const Z_BLOCKS: [Blocks; 4] = [
    [(0, 0), (1, 0), (1, 1), (2, 1)],
    [(2, 0), (1, 1), (2, 1), (1, 2)],
    [(0, 1), (1, 1), (1, 2), (2, 2)],
    [(1, 0), (0, 1), (1, 1), (0, 2)],
];
const J_BLOCKS: [Blocks; 4] = [
    [(0, 0), (0, 1), (1, 1), (2, 1)],
    [(1, 0), (2, 0), (1, 1), (1, 2)],
    [(0, 1), (1, 1), (2, 1), (2, 2)],
    [(1, 0), (1, 1), (0, 2), (1, 2)],
];
const L_BLOCKS: [Blocks; 4] = [
    [(2, 0), (0, 1), (1, 1), (2, 1)],
    [(1, 0), (1, 1), (1, 2), (2, 2)],
    [(0, 1), (1, 1), (2, 1), (0, 2)],
    [(0, 0), (1, 0), (1, 1), (1, 2)],
];

impl Shape {
    pub const ALL: [Shape; 7] =
        [Shape::I, Shape::O, Shape::T, Shape::S, Shape::Z, Shape::J, Shape::L];

    pub fn blocks(self, rotation: u8) -> Blocks {
        let table = match self {
            Shape::I => &I_BLOCKS,
            Shape::O => &O_BLOCKS,
            Shape::T => &T_BLOCKS,
            Shape::S => &S_BLOCKS,
            Shape::Z => &Z_BLOCKS,
            Shape::J => &J_BLOCKS,
            Shape::L => &L_BLOCKS,
        };
        table[(rotation % 4) as usize]
    }

    /// `(min_dx, max_dx, min_dy)` of the cells for a rotation.
    fn extent(self, rotation: u8) -> (i32, i32, i32) {
        let blocks = self.blocks(rotation);
        let min_dx = blocks.iter().map(|b| b.0).min().unwrap_or(0);
        let max_dx = blocks.iter().map(|b| b.0).max().unwrap_or(0);
        let min_dy = blocks.iter().map(|b| b.1).min().unwrap_or(0);
        (min_dx, max_dx, min_dy)
    }
}

/// The active falling piece. `x, y` is the top-left of its 4×4 box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Piece {
    pub shape: Shape,
    pub rotation: u8,
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl Piece {
    /// Absolute grid cells.
    pub fn cells(&self) -> Blocks {
        self.shape
            .blocks(self.rotation)
            .map(|(dx, dy)| (self.x + dx, self.y + dy))
    }

    fn moved(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
    }

    fn rotated(self) -> Self {
        Self {
            rotation: (self.rotation + 1) % 4,
            ..self
        }
    }
}

// ── Grid ─────────────────────────────────────────────────────────────

/// Locked cells, row-major. `None` is empty.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    width: i32,
    height: i32,
    cells: Vec<Option<Color>>,
}

impl OccupancyGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            cells: vec![None; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    /// In bounds and not occupied.
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.cells[i].is_none())
    }

    fn fill(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = Some(color);
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Every locked cell with its position.
    pub fn occupied(&self) -> impl Iterator<Item = (i32, i32, Color)> + '_ {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .filter_map(move |(i, c)| c.map(|c| (i as i32 % width, i as i32 / width, c)))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

// ── Options ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TetrisOptions {
    /// Seconds per row.
    pub fall_speed: f32,
    /// Seconds between unconditional board wipes.
    pub reset_interval: f32,
    /// Chance per fall step of trying a sideways move.
    pub shift_chance: f64,
    /// Chance per fall step of trying a rotation.
    pub rotate_chance: f64,
    /// Spawn in a random column instead of the center.
    pub random_spawn: bool,
    pub grid_width: i32,
    pub grid_height: i32,
}

impl Default for TetrisOptions {
    fn default() -> Self {
        Self {
            fall_speed: 0.1,
            reset_interval: 60.0,
            shift_chance: 0.3,
            rotate_chance: 0.2,
            random_spawn: true,
            grid_width: 16,
            grid_height: 6,
        }
    }
}

impl SceneOptions for TetrisOptions {
    fn check(&self) -> Result<(), String> {
        if !(self.fall_speed.is_finite() && self.fall_speed > 0.0) {
            return Err(format!("fall_speed must be positive, got {}", self.fall_speed));
        }
        if !(self.reset_interval.is_finite() && self.reset_interval > 0.0) {
            return Err(format!("reset_interval must be positive, got {}", self.reset_interval));
        }
        let chances = [("shift_chance", self.shift_chance), ("rotate_chance", self.rotate_chance)];
        for (name, chance) in chances {
            if !(0.0..=1.0).contains(&chance) {
                return Err(format!("{name} must be 0.0-1.0, got {chance}"));
            }
        }
        if !(4..=64).contains(&self.grid_width) || !(4..=32).contains(&self.grid_height) {
            return Err(format!(
                "grid must be 4-64 wide and 4-32 tall, got {}x{}",
                self.grid_width, self.grid_height
            ));
        }
        Ok(())
    }
}

pub fn entry() -> SceneEntry {
    SceneEntry {
        validate: |config| parse_options::<TetrisOptions>(config).map(|_| ()),
        build: |ctx, config: &SceneConfig| {
            let options = parse_options(config)?;
            Ok(Box::new(TetrisScene::new(*ctx, options)))
        },
    }
}

// ── Scene ────────────────────────────────────────────────────────────

pub struct TetrisScene {
    ctx: SceneContext,
    options: TetrisOptions,
    grid: OccupancyGrid,
    active: Option<Piece>,
    fall_timer: f32,
    reset_timer: f32,
    pieces_locked: u64,
    block_size: i32,
    origin: (i32, i32),
    rng: StdRng,
}

impl TetrisScene {
    pub fn new(ctx: SceneContext, options: TetrisOptions) -> Self {
        let (w, h) = (ctx.panel.width(), ctx.panel.height());
        // 10px side margins, 2px top and bottom
        let block_size = ((w - 20) / options.grid_width)
            .min((h - 4) / options.grid_height)
            .max(1);
        let origin = (
            (w - options.grid_width * block_size) / 2,
            (h - options.grid_height * block_size) / 2,
        );

        let mut scene = Self {
            ctx,
            grid: OccupancyGrid::new(options.grid_width, options.grid_height),
            options,
            active: None,
            fall_timer: 0.0,
            reset_timer: 0.0,
            pieces_locked: 0,
            block_size,
            origin,
            rng: ctx.rng(),
        };
        scene.spawn();

        tracing::info!(
            "TetrisScene loaded (block_size={}, grid_pos=({},{}))",
            block_size,
            origin.0,
            origin.1
        );
        scene
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn active_piece(&self) -> Option<&Piece> {
        self.active.as_ref()
    }

    pub fn pieces_locked(&self) -> u64 {
        self.pieces_locked
    }

    /// Where a piece of this shape and rotation enters the board: its top
    /// cell on row 0, centered horizontally.
    pub fn spawn_position(&self, shape: Shape, rotation: u8) -> (i32, i32) {
        let (min_dx, max_dx, min_dy) = shape.extent(rotation);
        let span = max_dx - min_dx + 1;
        ((self.grid.width() - span) / 2 - min_dx, -min_dy)
    }

    fn fits(&self, piece: &Piece) -> bool {
        piece.cells().iter().all(|&(x, y)| self.grid.is_free(x, y))
    }

    fn spawn(&mut self) {
        let shape = Shape::ALL[self.rng.gen_range(0..Shape::ALL.len())];
        let rotation = self.rng.gen_range(0..4u8);
        let color = Color::new(
            self.rng.gen_range(100..=255),
            self.rng.gen_range(100..=255),
            self.rng.gen_range(100..=255),
        );

        let (mut x, y) = self.spawn_position(shape, rotation);
        if self.options.random_spawn {
            let (min_dx, max_dx, _) = shape.extent(rotation);
            x = self.rng.gen_range(-min_dx..=self.grid.width() - 1 - max_dx);
        }

        let piece = Piece {
            shape,
            rotation,
            x,
            y,
            color,
        };

        if !self.fits(&piece) {
            tracing::info!("TetrisScene: no room to spawn, resetting grid");
            self.grid.clear();
            self.reset_timer = 0.0;
        }
        self.active = Some(piece);
    }

    /// Move the active piece sideways if it fits. Returns whether it moved.
    pub fn try_shift(&mut self, dx: i32) -> bool {
        self.try_replace(|p| p.moved(dx, 0))
    }

    /// Rotate the active piece clockwise if it fits. Returns whether it turned.
    pub fn try_rotate(&mut self) -> bool {
        self.try_replace(Piece::rotated)
    }

    fn try_replace(&mut self, change: impl FnOnce(Piece) -> Piece) -> bool {
        let Some(piece) = self.active else {
            return false;
        };
        let candidate = change(piece);
        if self.fits(&candidate) {
            self.active = Some(candidate);
            true
        } else {
            false
        }
    }

    fn lock(&mut self, piece: Piece) {
        for (x, y) in piece.cells() {
            self.grid.fill(x, y, piece.color);
        }
        self.pieces_locked += 1;
    }

    /// One fall step: maybe jitter, then drop a row or lock and respawn.
    pub fn step(&mut self) {
        if self.rng.gen_bool(self.options.shift_chance) {
            let dx = if self.rng.gen_bool(0.5) { -1 } else { 1 };
            self.try_shift(dx);
        }
        if self.rng.gen_bool(self.options.rotate_chance) {
            self.try_rotate();
        }

        let Some(piece) = self.active else {
            return;
        };
        let dropped = piece.moved(0, 1);
        if self.fits(&dropped) {
            self.active = Some(dropped);
        } else {
            self.lock(piece);
            self.spawn();
        }
    }

    pub fn reset_grid(&mut self) {
        self.grid.clear();
        self.reset_timer = 0.0;
        tracing::info!("TetrisScene: grid reset after {} seconds", self.options.reset_interval);
    }

    fn draw_cell(&self, canvas: &mut dyn Canvas, x: i32, y: i32, color: Color) {
        canvas.set_color(self.ctx.pen(color));
        canvas.draw_rect(
            self.origin.0 + x * self.block_size,
            self.origin.1 + y * self.block_size,
            self.block_size - 1,
            self.block_size - 1,
            Fill::Solid,
        );
    }
}

impl Scene for TetrisScene {
    fn name(&self) -> &'static str {
        NAME
    }

    fn update(&mut self, dt: f32) {
        self.reset_timer += dt;
        if self.reset_timer >= self.options.reset_interval {
            self.reset_grid();
        }

        self.fall_timer += dt;
        if self.fall_timer >= self.options.fall_speed {
            self.fall_timer = 0.0;
            self.step();
        }
    }

    fn render(&self, canvas: &mut dyn Canvas) {
        for (x, y, color) in self.grid.occupied() {
            self.draw_cell(canvas, x, y, color);
        }
        if let Some(piece) = &self.active {
            for (x, y) in piece.cells() {
                self.draw_cell(canvas, x, y, piece.color);
            }
        }
    }

    fn cleanup(&mut self) {
        tracing::info!("TetrisScene cleanup");
        self.grid = OccupancyGrid::new(0, 0);
        self.active = None;
    }
}
