//! Scene engine for an RGB LED matrix clock.
//!
//! The crate drives a fixed-resolution pixel matrix with a rotating set of
//! procedural scenes (spinning wireframe cubes, a self-playing falling-block
//! stacker, an autopiloted asteroid field) chosen by a [`manager::SceneManager`]
//! under an hourly [`mode::ModeSchedule`] of normal / dark / off.
//!
//! This module holds the pieces every other module leans on:
//! - Panel configuration
//! - The [`Color`] type and its brightness / dimming math
//! - Matrix initialization with our hardware defaults
//! - Signal handling for clean shutdown
//!
//! Everything except [`create_matrix`] and the matrix display in
//! [`render`] builds without the `hardware` feature, so the simulation
//! can be tested anywhere with `cargo test --no-default-features`.

pub mod canvas;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod mode;
pub mod render;
pub mod scenes;

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Panel configuration ────────────────────────────────────────────

/// Configuration for the LED panel dimensions.
///
/// # Rust concept: derive macros
/// `Clone, Copy` make this cheaply copyable (it's just two u32s), so every
/// scene gets its own copy at construction instead of reaching for a global.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Panel width in pixels.
    pub fn width(&self) -> i32 {
        self.cols as i32
    }

    /// Panel height in pixels.
    pub fn height(&self) -> i32 {
        self.rows as i32
    }
}

impl Default for PanelConfig {
    /// The reference clock: four chained 64×64 panels, 256×64.
    fn default() -> Self {
        Self { rows: 64, cols: 256 }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// This lets us test color logic anywhere without needing `rpi-led-matrix`.
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a color from a hue value (0-360), with full saturation and brightness.
    ///
    /// # Rust concept: match expressions
    /// Rust's `match` is exhaustive, so the final arm covers sectors the
    /// modulo already rules out.
    pub fn from_hue(hue: u16) -> Self {
        let hue = hue % 360;
        let sector = hue / 60;
        let fraction = ((hue % 60) as f32) / 60.0;
        let rising = (fraction * 255.0) as u8;
        let falling = ((1.0 - fraction) * 255.0) as u8;

        match sector {
            0 => Self::new(255, rising, 0),  // Red → Yellow
            1 => Self::new(falling, 255, 0), // Yellow → Green
            2 => Self::new(0, 255, rising),  // Green → Cyan
            3 => Self::new(0, falling, 255), // Cyan → Blue
            4 => Self::new(rising, 0, 255),  // Blue → Magenta
            5 => Self::new(255, 0, falling), // Magenta → Red
            _ => Self::new(255, 0, 0),
        }
    }

    /// Apply panel brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }

    /// Scale every channel by `factor`, rounding to nearest.
    ///
    /// The factor is clamped to `[0, 1]`, so a channel can only shrink and
    /// the result never saturates. This is the dark-mode dimmer.
    pub fn scale(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        let channel = |v: u8| (v as f32 * factor).round() as u8;
        Self {
            r: channel(self.r),
            g: channel(self.g),
            b: channel(self.b),
        }
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Create a matrix configured for our hardware.
///
/// # Rust concept: Result and the ? operator
/// Matrix initialization can fail (not running as root, GPIO unavailable),
/// so this returns `Result` and the caller propagates with `?`.
#[cfg(feature = "hardware")]
pub fn create_matrix(panel: PanelConfig) -> Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_hardware_mapping("adafruit-hat");

    options.set_pwm_bits(8)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2);

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;

    Ok(matrix)
}

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The frame loop and the signal handler share the `running` flag. `Arc`
/// gives both of them ownership; `AtomicBool` makes the flag safe to flip
/// from the handler thread without a mutex.
pub fn setup_signal_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    Ok(running)
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn panel_config_default_is_256x64() {
        let panel = PanelConfig::default();
        assert_eq!(panel.width(), 256);
        assert_eq!(panel.height(), 64);
    }

    #[rstest]
    #[case(0, 255, 0, 0)] // Red
    #[case(60, 255, 255, 0)] // Yellow
    #[case(120, 0, 255, 0)] // Green
    #[case(180, 0, 255, 255)] // Cyan
    #[case(240, 0, 0, 255)] // Blue
    #[case(300, 255, 0, 255)] // Magenta
    fn test_color_from_hue_primary(#[case] hue: u16, #[case] r: u8, #[case] g: u8, #[case] b: u8) {
        assert_eq!(Color::from_hue(hue), Color::new(r, g, b));
    }

    #[test]
    fn color_from_hue_wraps_at_360() {
        assert_eq!(Color::from_hue(0), Color::from_hue(360));
        assert_eq!(Color::from_hue(90), Color::from_hue(450));
    }

    #[test]
    fn apply_brightness_100_is_identity() {
        let c = Color::new(100, 200, 50);
        assert_eq!(c.apply_brightness(100), c);
    }

    #[test]
    fn apply_brightness_50_halves() {
        assert_eq!(
            Color::new(200, 100, 50).apply_brightness(50),
            Color::new(100, 50, 25)
        );
    }

    #[rstest]
    #[case(1.0, Color::new(220, 117, 3))]
    #[case(0.5, Color::new(110, 59, 2))]
    #[case(0.0, Color::BLACK)]
    fn scale_is_elementwise(#[case] factor: f32, #[case] expected: Color) {
        assert_eq!(Color::new(220, 117, 3).scale(factor), expected);
    }

    #[test]
    fn scale_clamps_factor_into_unit_range() {
        let c = Color::new(200, 100, 50);
        assert_eq!(c.scale(2.5), c);
        assert_eq!(c.scale(-1.0), Color::BLACK);
    }

    #[test]
    fn scale_never_exceeds_source_channel() {
        let c = Color::new(255, 255, 255);
        for step in 0..=100 {
            let dimmed = c.scale(step as f32 / 100.0);
            assert!(dimmed.r <= c.r && dimmed.g <= c.g && dimmed.b <= c.b);
        }
    }
}
