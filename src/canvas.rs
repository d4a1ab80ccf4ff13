//! The drawing surface scenes render into.
//!
//! Scenes only ever see `&mut dyn Canvas`: pick a pen with `set_color`,
//! then issue primitives in integer pixel coordinates. Anything that falls
//! outside the surface is clipped silently.
//!
//! [`FrameBuffer`] is the software implementation. The frame loop draws every
//! frame into one and the display layer decides what to do with it (blit to
//! the LED matrix, or keep it around for a PNG snapshot).
//!
//! ## Rust concepts
//! - Trait objects (`dyn Canvas`) so scenes don't care about the backend
//! - Default trait methods (`draw_polygon` is built from `draw_line`)
//! - A foreign trait (`embedded_graphics::DrawTarget`) on our own buffer, so
//!   lines, circles, rectangles and text come from embedded-graphics

use crate::Color;
use embedded_graphics::geometry::{OriginDimensions, Point, Size};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::{Rgb888, RgbColor};
use embedded_graphics::primitives::{Circle, Line, Primitive, PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;
use embedded_graphics::{Drawable, Pixel};
use image::RgbImage;
use std::convert::Infallible;
use std::path::Path;

/// Whether a closed shape is filled or only outlined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Solid,
    Outline,
}

/// The drawing contract every scene renders against.
pub trait Canvas {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    /// Select the pen used by every following primitive.
    fn set_color(&mut self, color: Color);

    fn draw_point(&mut self, x: i32, y: i32);
    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32);
    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, fill: Fill);
    fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, fill: Fill);

    /// Reset every pixel to black.
    fn clear(&mut self);

    /// Draw a closed outline through `points`.
    fn draw_polygon(&mut self, points: &[(i32, i32)]) {
        for (i, &(x0, y0)) in points.iter().enumerate() {
            let (x1, y1) = points[(i + 1) % points.len()];
            self.draw_line(x0, y0, x1, y1);
        }
    }
}

// ── FrameBuffer ──────────────────────────────────────────────────────

/// An in-memory RGB surface implementing [`Canvas`].
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    width: i32,
    height: i32,
    pen: Color,
    pixels: Vec<Color>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
            pen: Color::WHITE,
            pixels: vec![Color::BLACK; (width * height) as usize],
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    /// Pixel at `(x, y)`, or `None` when outside the surface.
    pub fn get(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Every pixel with its coordinates, row-major.
    pub fn pixels(&self) -> impl Iterator<Item = (i32, i32, Color)> + '_ {
        let width = self.width;
        self.pixels
            .iter()
            .enumerate()
            .map(move |(i, &c)| (i as i32 % width, i as i32 / width, c))
    }

    /// Number of pixels that are not black.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|&&c| c != Color::BLACK).count()
    }

    fn stroke(&self) -> PrimitiveStyle<Rgb888> {
        PrimitiveStyle::with_stroke(self.pen.into(), 1)
    }

    fn style(&self, fill: Fill) -> PrimitiveStyle<Rgb888> {
        match fill {
            Fill::Solid => PrimitiveStyle::with_fill(self.pen.into()),
            Fill::Outline => self.stroke(),
        }
    }

    /// Draw `text` in a monospace font with its baseline at `y`.
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32, color: Color, font: &MonoFont<'_>) {
        let style = MonoTextStyle::new(font, color.into());
        let _ = Text::new(text, Point::new(x, y), style).draw(self);
    }

    /// Copy the frame into an `RgbImage`, scaled by panel brightness.
    pub fn to_image(&self, brightness: u8) -> RgbImage {
        let mut img = RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, c) in self.pixels() {
            let c = c.apply_brightness(brightness);
            img.put_pixel(x as u32, y as u32, image::Rgb([c.r, c.g, c.b]));
        }
        img
    }

    /// Write the frame to disk as a PNG.
    pub fn save_png(&self, path: &Path, brightness: u8) -> Result<(), image::ImageError> {
        self.to_image(brightness).save(path)
    }
}

impl Canvas for FrameBuffer {
    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn set_color(&mut self, color: Color) {
        self.pen = color;
    }

    fn draw_point(&mut self, x: i32, y: i32) {
        let _ = Pixel(Point::new(x, y), Rgb888::from(self.pen)).draw(self);
    }

    fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let style = self.stroke();
        let _ = Line::new(Point::new(x0, y0), Point::new(x1, y1))
            .into_styled(style)
            .draw(self);
    }

    fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, fill: Fill) {
        if radius < 0 {
            return;
        }
        let style = self.style(fill);
        let _ = Circle::with_center(Point::new(cx, cy), (2 * radius + 1) as u32)
            .into_styled(style)
            .draw(self);
    }

    fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, fill: Fill) {
        if w <= 0 || h <= 0 {
            return;
        }
        let style = self.style(fill);
        let _ = Rectangle::new(Point::new(x, y), Size::new(w as u32, h as u32))
            .into_styled(style)
            .draw(self);
    }

    fn clear(&mut self) {
        self.pixels.fill(Color::BLACK);
    }
}

// ── embedded-graphics ────────────────────────────────────────────────

impl From<Color> for Rgb888 {
    fn from(c: Color) -> Self {
        Rgb888::new(c.r, c.g, c.b)
    }
}

impl From<Rgb888> for Color {
    fn from(c: Rgb888) -> Self {
        Color::new(c.r(), c.g(), c.b())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

/// Rust concept: IMPLEMENTING A FOREIGN TRAIT
/// With `DrawTarget` in place, every embedded-graphics primitive and font can
/// draw into the frame. Only `draw_iter` is required; pixels outside the
/// surface are dropped here, so callers never clip.
impl embedded_graphics::draw_target::DrawTarget for FrameBuffer {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if let Some(i) = self.index(coord.x, coord.y) {
                self.pixels[i] = color.into();
            }
        }
        Ok(())
    }
}

// ── Test support ─────────────────────────────────────────────────────

/// A canvas that remembers what it was asked to draw.
#[cfg(test)]
pub(crate) mod recording {
    use super::{Canvas, Fill};
    use crate::Color;

    #[derive(Clone, Debug, PartialEq)]
    pub enum DrawOp {
        Pen(Color),
        Point(i32, i32),
        Line(i32, i32, i32, i32),
        Circle(i32, i32, i32, Fill),
        Rect(i32, i32, i32, i32, Fill),
        Clear,
    }

    pub struct RecordingCanvas {
        pub width: i32,
        pub height: i32,
        pub ops: Vec<DrawOp>,
    }

    impl RecordingCanvas {
        pub fn new(width: i32, height: i32) -> Self {
            Self {
                width,
                height,
                ops: Vec::new(),
            }
        }

        /// Every pen selected, in order.
        pub fn pens(&self) -> Vec<Color> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    DrawOp::Pen(c) => Some(*c),
                    _ => None,
                })
                .collect()
        }

        pub fn lines(&self) -> usize {
            self.ops
                .iter()
                .filter(|op| matches!(op, DrawOp::Line(..)))
                .count()
        }

        pub fn rects(&self) -> Vec<(i32, i32, i32, i32)> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    DrawOp::Rect(x, y, w, h, _) => Some((*x, *y, *w, *h)),
                    _ => None,
                })
                .collect()
        }
    }

    impl Canvas for RecordingCanvas {
        fn width(&self) -> i32 {
            self.width
        }
        fn height(&self) -> i32 {
            self.height
        }
        fn set_color(&mut self, color: Color) {
            self.ops.push(DrawOp::Pen(color));
        }
        fn draw_point(&mut self, x: i32, y: i32) {
            self.ops.push(DrawOp::Point(x, y));
        }
        fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
            self.ops.push(DrawOp::Line(x0, y0, x1, y1));
        }
        fn draw_circle(&mut self, cx: i32, cy: i32, radius: i32, fill: Fill) {
            self.ops.push(DrawOp::Circle(cx, cy, radius, fill));
        }
        fn draw_rect(&mut self, x: i32, y: i32, w: i32, h: i32, fill: Fill) {
            self.ops.push(DrawOp::Rect(x, y, w, h, fill));
        }
        fn clear(&mut self) {
            self.ops.push(DrawOp::Clear);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::mono_font::ascii::FONT_6X13;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RED: Color = Color::new(255, 0, 0);

    #[test]
    fn new_frame_is_black() {
        let fb = FrameBuffer::new(8, 4);
        assert_eq!(fb.lit_count(), 0);
        assert_eq!(fb.pixels().count(), 32);
    }

    #[test]
    fn point_outside_surface_is_clipped() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.draw_point(-1, 0);
        fb.draw_point(4, 2);
        fb.draw_point(1, 99);
        assert_eq!(fb.lit_count(), 0);
        assert_eq!(fb.get(4, 2), None);
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut fb = FrameBuffer::new(16, 16);
        fb.set_color(RED);
        fb.draw_line(1, 2, 12, 9);
        assert_eq!(fb.get(1, 2), Some(RED));
        assert_eq!(fb.get(12, 9), Some(RED));
        assert_eq!(fb.lit_count(), 12);
    }

    #[test]
    fn reversed_line_matches_pixel_count() {
        let mut forward = FrameBuffer::new(16, 16);
        let mut backward = FrameBuffer::new(16, 16);
        forward.draw_line(0, 15, 15, 0);
        backward.draw_line(15, 0, 0, 15);
        assert_eq!(forward.lit_count(), backward.lit_count());
    }

    #[test]
    fn solid_rect_fills_area() {
        let mut fb = FrameBuffer::new(10, 10);
        fb.draw_rect(2, 3, 4, 5, Fill::Solid);
        assert_eq!(fb.lit_count(), 20);
        assert_eq!(fb.get(5, 7), Some(Color::WHITE));
        assert_eq!(fb.get(6, 7), Some(Color::BLACK));
    }

    #[test]
    fn outline_rect_leaves_middle_empty() {
        let mut fb = FrameBuffer::new(10, 10);
        fb.draw_rect(0, 0, 5, 5, Fill::Outline);
        assert_eq!(fb.lit_count(), 16);
        assert_eq!(fb.get(2, 2), Some(Color::BLACK));
    }

    #[test]
    fn circle_outline_touches_cardinal_points() {
        let mut fb = FrameBuffer::new(20, 20);
        fb.draw_circle(10, 10, 5, Fill::Outline);
        for (x, y) in [(15, 10), (5, 10), (10, 15), (10, 5)] {
            assert_eq!(fb.get(x, y), Some(Color::WHITE), "({x},{y})");
        }
        assert_eq!(fb.get(10, 10), Some(Color::BLACK));
    }

    #[test]
    fn solid_circle_fills_center() {
        let mut fb = FrameBuffer::new(20, 20);
        fb.draw_circle(10, 10, 5, Fill::Solid);
        assert_eq!(fb.get(10, 10), Some(Color::WHITE));
    }

    #[test]
    fn polygon_closes_the_loop() {
        let mut rec = recording::RecordingCanvas::new(10, 10);
        rec.draw_polygon(&[(0, 0), (5, 0), (5, 5)]);
        assert_eq!(rec.lines(), 3);
    }

    #[test]
    fn shapes_hanging_off_the_edge_are_clipped() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.draw_circle(0, 0, 6, Fill::Solid);
        fb.draw_rect(-4, 6, 20, 20, Fill::Solid);
        fb.draw_line(-10, 3, 20, 3);
        assert_eq!(fb.get(0, 0), Some(Color::WHITE));
        assert_eq!(fb.get(7, 7), Some(Color::WHITE));
        assert_eq!(fb.get(7, 3), Some(Color::WHITE));
    }

    #[test]
    fn text_lands_right_of_origin_above_baseline() {
        let mut fb = FrameBuffer::new(64, 16);
        fb.draw_text("12:34", 2, 12, RED, &FONT_6X13);

        assert!(fb.lit_count() > 10);
        for (x, y, c) in fb.pixels().filter(|(_, _, c)| *c != Color::BLACK) {
            assert_eq!(c, RED);
            assert!((2..2 + 6 * 5).contains(&x), "x={x}");
            assert!(y <= 12 + 2, "y={y}");
        }
    }

    #[test]
    fn clear_resets_pixels() {
        let mut fb = FrameBuffer::new(4, 4);
        fb.draw_rect(0, 0, 4, 4, Fill::Solid);
        fb.clear();
        assert_eq!(fb.lit_count(), 0);
    }

    #[test]
    fn snapshot_applies_brightness() {
        let mut fb = FrameBuffer::new(2, 1);
        fb.set_color(Color::new(200, 100, 50));
        fb.draw_point(0, 0);
        let img = fb.to_image(50);
        assert_eq!(img.get_pixel(0, 0).0, [100, 50, 25]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn save_png_writes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.png");
        let fb = FrameBuffer::new(4, 4);
        fb.save_png(&path, 100).unwrap();
        assert!(path.is_file());
    }
}
