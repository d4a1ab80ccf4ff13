//! Frame loop: owns the display and drives the scene manager once per frame.
//!
//! The `rpi-led-matrix` C library is not thread-safe, so the matrix lives on
//! the thread that runs [`FrameLoop::run`] and nothing else touches it.
//! Scenes never draw to the hardware directly. They draw into a
//! [`FrameBuffer`], and the [`Display`] copies that buffer to wherever it
//! goes (the LED panel, or just memory for headless runs and tests).
//!
//! ## Rust concepts
//! - Generic structs (`FrameLoop<C, D>`) instead of trait objects when the
//!   concrete types are fixed at start-up
//! - `Option::take()` to move an owned canvas through `matrix.swap()`
//! - `#[cfg(feature = "hardware")]` to compile the matrix display only on the Pi

use crate::canvas::{Canvas, FrameBuffer};
use crate::clock::ClockSource;
use crate::config::{Config, HudConfig};
use crate::is_running;
use crate::manager::{SceneManager, TickOutcome};
use crate::mode::{DisplayMode, ModeCategory, ModeSchedule};
use crate::{Color, PanelConfig};
use chrono::Timelike;
use embedded_graphics::mono_font::{MonoFont, ascii};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::{Duration, Instant};

/// Slow frames logged before going quiet.
const SLOW_FRAME_LOG_LIMIT: u32 = 5;

// ── Displays ─────────────────────────────────────────────────────────

/// Clock text to draw over the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct HudText {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

/// Where finished frames go.
///
/// Rust concept: TRAITS AS SEAMS
/// The frame loop is written once against this trait. On the Pi it gets a
/// [`MatrixDisplay`]; in tests and `--no-default-features` builds it gets a
/// [`HeadlessDisplay`]. Neither the loop nor the scenes know the difference.
pub trait Display {
    /// The buffer scenes draw into this frame.
    fn frame(&mut self) -> &mut FrameBuffer;

    /// Push the frame out, scaled by panel brightness (0-100), with an
    /// optional clock overlay.
    fn present(&mut self, brightness: u8, hud: Option<&HudText>);
}

/// The built-in monospace font closest to a BDF font name such as `6x13`.
///
/// Unknown names fall back to 6x13, the size the HUD is laid out for.
pub fn mono_font(name: &str) -> &'static MonoFont<'static> {
    match name {
        "4x6" => &ascii::FONT_4X6,
        "5x7" => &ascii::FONT_5X7,
        "5x8" => &ascii::FONT_5X8,
        "6x9" => &ascii::FONT_6X9,
        "6x10" => &ascii::FONT_6X10,
        "6x12" => &ascii::FONT_6X12,
        "7x13" => &ascii::FONT_7X13,
        "7x14" => &ascii::FONT_7X14,
        "8x13" => &ascii::FONT_8X13,
        "9x15" => &ascii::FONT_9X15,
        "9x18" => &ascii::FONT_9X18,
        "10x20" => &ascii::FONT_10X20,
        _ => &ascii::FONT_6X13,
    }
}

/// A display that keeps the last frame in memory.
///
/// The clock overlay is drawn into the frame with an embedded-graphics
/// font, so snapshots show it too.
pub struct HeadlessDisplay {
    frame: FrameBuffer,
    font: &'static MonoFont<'static>,
    brightness: u8,
    hud: Option<HudText>,
    presented: u64,
}

impl HeadlessDisplay {
    pub fn new(panel: PanelConfig, font: &str) -> Self {
        Self {
            frame: FrameBuffer::new(panel.cols, panel.rows),
            font: mono_font(font),
            brightness: 100,
            hud: None,
            presented: 0,
        }
    }

    /// The most recently presented frame (until the next one is drawn).
    pub fn last_frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn last_hud(&self) -> Option<&HudText> {
        self.hud.as_ref()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Write the last frame as a PNG, with the brightness it was presented at.
    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.frame.save_png(path, self.brightness)
    }
}

impl Display for HeadlessDisplay {
    fn frame(&mut self) -> &mut FrameBuffer {
        &mut self.frame
    }

    fn present(&mut self, brightness: u8, hud: Option<&HudText>) {
        if let Some(hud) = hud {
            self.frame.draw_text(&hud.text, hud.x, hud.y, hud.color, self.font);
        }
        self.brightness = brightness.min(100);
        self.hud = hud.cloned();
        self.presented += 1;
    }
}

/// The physical LED panel.
#[cfg(feature = "hardware")]
pub struct MatrixDisplay {
    matrix: rpi_led_matrix::LedMatrix,
    /// `None` only for the instant between `take()` and `swap()`.
    canvas: Option<rpi_led_matrix::LedCanvas>,
    frame: FrameBuffer,
    font: Option<rpi_led_matrix::LedFont>,
}

#[cfg(feature = "hardware")]
impl MatrixDisplay {
    /// Bring up the matrix and load the HUD font from `fonts_dir`.
    ///
    /// A missing font is not fatal: the clock overlay is skipped.
    pub fn new(
        panel: PanelConfig,
        fonts_dir: &Path,
        hud: &HudConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let matrix = crate::create_matrix(panel)?;
        let canvas = matrix.offscreen_canvas();

        let font = if hud.enabled {
            let font_path = fonts_dir.join(format!("{}.bdf", hud.font));
            match rpi_led_matrix::LedFont::new(&font_path) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!(
                        "Failed to load font {}: {}, clock overlay disabled",
                        font_path.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            matrix,
            canvas: Some(canvas),
            frame: FrameBuffer::new(panel.cols, panel.rows),
            font,
        })
    }
}

#[cfg(feature = "hardware")]
impl Display for MatrixDisplay {
    fn frame(&mut self) -> &mut FrameBuffer {
        &mut self.frame
    }

    fn present(&mut self, brightness: u8, hud: Option<&HudText>) {
        let Some(mut canvas) = self.canvas.take() else {
            return;
        };

        for (x, y, c) in self.frame.pixels() {
            canvas.set(x, y, &c.apply_brightness(brightness).into());
        }
        if let (Some(font), Some(hud)) = (&self.font, hud) {
            let color = hud.color.apply_brightness(brightness);
            canvas.draw_text(font, &hud.text, hud.x, hud.y, &color.into(), 0, false);
        }

        self.canvas = Some(self.matrix.swap(canvas));
    }
}

// ── Frame loop ───────────────────────────────────────────────────────

/// One clock, one display, one manager: the whole running system.
pub struct FrameLoop<C: ClockSource, D: Display> {
    clock: C,
    display: D,
    schedule: ModeSchedule,
    manager: SceneManager,
    brightness: u8,
    dim_factor: f32,
    hud: HudConfig,
    frame_interval: Duration,
    mode: Option<DisplayMode>,
    frames: u64,
    slow_frames: u32,
}

impl<C: ClockSource, D: Display> FrameLoop<C, D> {
    pub fn new(config: &Config, clock: C, display: D, manager: SceneManager) -> Self {
        Self {
            clock,
            display,
            schedule: config.mode_schedule.clone(),
            manager,
            brightness: config.brightness,
            dim_factor: config.night_mode_dim_factor,
            hud: config.hud.clone(),
            frame_interval: config.frame_interval,
            mode: None,
            frames: 0,
            slow_frames: 0,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn manager(&self) -> &SceneManager {
        &self.manager
    }

    /// Mode resolved on the last frame.
    pub fn mode(&self) -> Option<DisplayMode> {
        self.mode
    }

    /// Frames stepped so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Render and present exactly one frame, without pacing.
    pub fn step(&mut self) -> TickOutcome {
        let dt = self.clock.delta();
        let now = self.clock.now();
        let mode = self.schedule.mode_at(now.hour());
        if self.mode != Some(mode) {
            tracing::info!("Display mode: {} (hour {})", mode, now.hour());
            self.mode = Some(mode);
        }

        let frame = self.display.frame();
        frame.clear();
        let outcome = self.manager.tick(dt, mode, frame);

        let hud = match outcome {
            TickOutcome::Rendered { .. } if self.hud.enabled => {
                let color = Color::from(self.hud.color);
                let color = match mode.category() {
                    Some(ModeCategory::Night) => color.scale(self.dim_factor),
                    _ => color,
                };
                Some(HudText {
                    text: now.format("%H:%M:%S").to_string(),
                    x: self.hud.x,
                    y: self.hud.y,
                    color,
                })
            }
            _ => None,
        };

        self.display.present(self.brightness, hud.as_ref());
        self.frames += 1;
        outcome
    }

    /// Step frames at `frame_interval` until `running` drops or `max_frames`
    /// have been shown. Returns the number of frames shown.
    pub fn run(&mut self, running: &AtomicBool, max_frames: Option<u64>) -> u64 {
        tracing::info!(
            "Frame loop started ({}ms per frame, brightness {})",
            self.frame_interval.as_millis(),
            self.brightness
        );

        while is_running(running) && max_frames.is_none_or(|max| self.frames < max) {
            let frame_start = Instant::now();
            self.step();
            let frame_time = frame_start.elapsed();

            if frame_time > self.frame_interval {
                self.slow_frames += 1;
                if self.slow_frames <= SLOW_FRAME_LOG_LIMIT {
                    tracing::warn!(
                        "Frame {} took {}ms (target: {}ms)",
                        self.frames,
                        frame_time.as_millis(),
                        self.frame_interval.as_millis()
                    );
                }
            } else {
                thread::sleep(self.frame_interval - frame_time);
            }
        }

        if self.slow_frames > 0 {
            tracing::warn!("{} slow frames out of {}", self.slow_frames, self.frames);
        }
        tracing::info!("Frame loop stopped after {} frames", self.frames);
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scenes::SceneRegistry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn config() -> Config {
        Config {
            seed: Some(11),
            frame_interval: Duration::from_millis(1),
            ..Config::default()
        }
    }

    fn frame_loop(hour: u32) -> FrameLoop<ManualClock, HeadlessDisplay> {
        let config = config();
        let panel = PanelConfig::default();
        let manager = SceneManager::new(&config, panel, SceneRegistry::builtin()).unwrap();
        let display = HeadlessDisplay::new(panel, &config.hud.font);
        FrameLoop::new(&config, ManualClock::new(hour, 0.05), display, manager)
    }

    #[test]
    fn normal_hour_renders_scene_and_clock() {
        let mut fl = frame_loop(9);
        let outcome = fl.step();

        assert!(matches!(outcome, TickOutcome::Rendered { .. }));
        assert_eq!(fl.mode(), Some(DisplayMode::Normal));
        assert!(fl.display().last_frame().lit_count() > 0);
        assert_eq!(
            fl.display().last_hud(),
            Some(&HudText {
                text: "09:00:00".to_string(),
                x: 2,
                y: 12,
                color: Color::WHITE,
            })
        );
    }

    #[test]
    fn off_hour_presents_black_frame_without_clock() {
        let mut fl = frame_loop(23);
        assert_eq!(fl.step(), TickOutcome::Idle);
        assert_eq!(fl.mode(), Some(DisplayMode::Off));
        assert_eq!(fl.display().last_frame().lit_count(), 0);
        assert_eq!(fl.display().last_hud(), None);
        assert_eq!(fl.display().presented(), 1);
    }

    #[test]
    fn dark_hour_dims_clock() {
        let mut fl = frame_loop(20);
        fl.step();
        let hud = fl.display().last_hud().unwrap();
        assert_eq!(hud.color, Color::WHITE.scale(0.3));
    }

    #[test]
    fn mode_follows_the_clock() {
        let mut fl = frame_loop(16);
        fl.step();
        assert_eq!(fl.mode(), Some(DisplayMode::Normal));

        fl.clock.set_hour(17);
        fl.step();
        assert_eq!(fl.mode(), Some(DisplayMode::Dark));
        // tetris ran by day, so sequential order moves on to asteroids
        assert_eq!(fl.manager().scene_info().unwrap().name, "asteroids");
    }

    #[test]
    fn previous_frame_is_cleared() {
        let mut fl = frame_loop(9);
        fl.step();
        assert!(fl.display().last_frame().lit_count() > 0);

        fl.clock.set_hour(23);
        fl.step();
        assert_eq!(fl.display().last_frame().lit_count(), 0);
    }

    #[test]
    fn headless_display_draws_clock_into_frame() {
        let mut display = HeadlessDisplay::new(PanelConfig::default(), "6x13");
        let hud = HudText {
            text: "21:07:45".to_string(),
            x: 2,
            y: 12,
            color: Color::new(0, 200, 0),
        };
        display.present(100, Some(&hud));

        let frame = display.last_frame();
        let clock_pixels = frame
            .pixels()
            .filter(|&(x, y, c)| x < 2 + 6 * 8 && y <= 14 && c == Color::new(0, 200, 0))
            .count();
        assert!(clock_pixels > 20, "only {clock_pixels} clock pixels");
        assert_eq!(frame.lit_count(), clock_pixels);
    }

    #[test]
    fn clock_shows_in_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clock.png");

        let mut fl = frame_loop(9);
        fl.step();
        fl.display().save_png(&path).unwrap();

        // brightness 75 turns the white clock into (191, 191, 191)
        let img = image::open(&path).unwrap().to_rgb8();
        let clock = (2..50)
            .flat_map(|x| (0..15).map(move |y| (x, y)))
            .filter(|&(x, y)| img.get_pixel(x, y).0 == [191, 191, 191])
            .count();
        assert!(clock > 0);
    }

    #[rstest]
    #[case("6x13", 13)]
    #[case("9x15", 15)]
    #[case("no-such-font", 13)]
    fn mono_font_by_bdf_name(#[case] name: &str, #[case] height: u32) {
        assert_eq!(mono_font(name).character_size.height, height);
    }

    #[test]
    fn run_stops_after_max_frames() {
        let mut fl = frame_loop(9);
        let running = AtomicBool::new(true);
        assert_eq!(fl.run(&running, Some(3)), 3);
        assert_eq!(fl.display().presented(), 3);
    }

    #[test]
    fn run_stops_when_flag_drops() {
        let mut fl = frame_loop(9);
        let running = AtomicBool::new(false);
        assert_eq!(fl.run(&running, None), 0);
    }

    #[test]
    fn snapshot_is_written_as_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");

        let mut fl = frame_loop(9);
        fl.step();
        fl.display().save_png(&path).unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!((img.width(), img.height()), (256, 64));
    }
}
