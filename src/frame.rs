//! Software composition of one overlay frame
//!
//! Layers, bottom to top: the cover-scaled image (or the diagnostic background),
//! the optional darkening mask, and the clock. The result is premultiplied ARGB32 at
//! full opacity; the window surface applies the lifecycle opacity to the whole frame.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use tracing::debug;

use crate::config::{ConfigSnapshot, TextAlignment};
use crate::constants::overlay;
use crate::font::{FontRenderer, RenderedText};
use crate::image_source::SourceImage;
use crate::types::Rect;

/// Size and crop offset of a cover-scaled image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverLayout {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub crop_x: u32,
    pub crop_y: u32,
}

/// Scale `src` to fill `dst` keeping aspect ratio; the overflow is cropped evenly
pub fn cover_layout(src: (u32, u32), dst: (u32, u32)) -> CoverLayout {
    let (sw, sh) = (src.0.max(1) as f64, src.1.max(1) as f64);
    let (dw, dh) = dst;
    let scale = (dw as f64 / sw).max(dh as f64 / sh);
    let scaled_width = ((sw * scale).round() as u32).max(dw);
    let scaled_height = ((sh * scale).round() as u32).max(dh);
    CoverLayout {
        scaled_width,
        scaled_height,
        crop_x: (scaled_width - dw) / 2,
        crop_y: (scaled_height - dh) / 2,
    }
}

/// Top-left corner of a `width` x `height` block aligned inside `area`
pub fn text_origin(alignment: TextAlignment, area: Rect, width: i32, height: i32) -> (i32, i32) {
    let left = area.x;
    let h_center = area.x + (area.width - width) / 2;
    let right = area.right() - width;
    let top = area.y;
    let v_center = area.y + (area.height - height) / 2;
    let bottom = area.bottom() - height;

    match alignment {
        TextAlignment::TopLeft => (left, top),
        TextAlignment::TopCenter => (h_center, top),
        TextAlignment::TopRight => (right, top),
        TextAlignment::BottomLeft => (left, bottom),
        TextAlignment::BottomCenter => (h_center, bottom),
        TextAlignment::BottomRight => (right, bottom),
        TextAlignment::Center => (h_center, v_center),
    }
}

/// Premultiplied ARGB32 pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl Canvas {
    pub fn solid(width: u32, height: u32, argb: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![argb; width as usize * height as usize],
        }
    }

    /// Cover-scale and center-crop `image` to exactly `width` x `height`
    pub fn cover(image: &SourceImage, width: u32, height: u32) -> Self {
        let layout = cover_layout(image.pixels.dimensions(), (width, height));
        debug!(
            source = ?image.pixels.dimensions(),
            scaled = ?(layout.scaled_width, layout.scaled_height),
            crop = ?(layout.crop_x, layout.crop_y),
            "Scaling reminder image"
        );
        let scaled = imageops::resize(&image.pixels, layout.scaled_width, layout.scaled_height, FilterType::Triangle);
        let cropped = imageops::crop_imm(&scaled, layout.crop_x, layout.crop_y, width, height).to_image();

        let pixels = cropped
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                let premultiply = |c: u8| (c as u32 * a as u32 + 127) / 255;
                (a as u32) << 24 | premultiply(r) << 16 | premultiply(g) << 8 | premultiply(b)
            })
            .collect();
        Self { width, height, pixels }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Composite uniform black at `alpha` over every pixel
    pub fn darken(&mut self, alpha: u8) {
        let keep = 255 - alpha as u32;
        for pixel in &mut self.pixels {
            let scale = |c: u32| (c * keep + 127) / 255;
            let a = alpha as u32 + scale(*pixel >> 24);
            let r = scale((*pixel >> 16) & 0xFF);
            let g = scale((*pixel >> 8) & 0xFF);
            let b = scale(*pixel & 0xFF);
            *pixel = a << 24 | r << 16 | g << 8 | b;
        }
    }

    /// Composite premultiplied text OVER the canvas with its top-left at (x, y)
    pub fn draw(&mut self, text: &RenderedText, x: i32, y: i32) {
        for ty in 0..text.height {
            let cy = y + ty as i32;
            if cy < 0 || cy >= self.height as i32 {
                continue;
            }
            for tx in 0..text.width {
                let cx = x + tx as i32;
                if cx < 0 || cx >= self.width as i32 {
                    continue;
                }
                let src = text.data[ty * text.width + tx];
                let src_a = src >> 24;
                if src_a == 0 {
                    continue;
                }
                let dst = &mut self.pixels[cy as usize * self.width as usize + cx as usize];
                *dst = over(src, *dst);
            }
        }
    }

    /// Bytes in X11 native order (little-endian BGRA)
    pub fn to_bgra_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for pixel in &self.pixels {
            bytes.extend_from_slice(&pixel.to_le_bytes());
        }
        bytes
    }
}

fn over(src: u32, dst: u32) -> u32 {
    let keep = 255 - (src >> 24);
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        (s + (d * keep + 127) / 255).min(255)
    };
    channel(24) << 24 | channel(16) << 16 | channel(8) << 8 | channel(0)
}

/// Builds frames for one display; the static layers are prepared once
pub struct FrameComposer<'a> {
    background: Canvas,
    snapshot: Arc<ConfigSnapshot>,
    font: Option<&'a FontRenderer>,
    last_clock: Option<String>,
}

impl<'a> FrameComposer<'a> {
    pub fn new(
        width: u32,
        height: u32,
        snapshot: Arc<ConfigSnapshot>,
        image: Option<&SourceImage>,
        font: Option<&'a FontRenderer>,
    ) -> Self {
        let mut background = match image {
            Some(image) => Canvas::cover(image, width, height),
            None => diagnostic_background(width, height, font),
        };
        if snapshot.show_mask {
            background.darken(overlay::MASK_ALPHA);
        }
        Self {
            background,
            snapshot,
            font,
            last_clock: None,
        }
    }

    /// Full frame with `clock` drawn on top, or `None` if the clock text is unchanged
    pub fn compose(&mut self, clock: &str) -> Option<Canvas> {
        if self.last_clock.as_deref() == Some(clock) {
            return None;
        }
        self.last_clock = Some(clock.to_string());

        let mut frame = self.background.clone();
        if let Some(font) = self.font {
            let size = self.snapshot.font_size.max(1) as f32;
            let text = font.render_text(clock, size, self.snapshot.text_color.argb());
            if !text.is_empty() {
                let area = frame.rect().inset(overlay::TEXT_MARGIN);
                let (x, y) = text_origin(self.snapshot.alignment, area, text.width as i32, text.height as i32);
                frame.draw(&text, x, y);
            }
        }
        Some(frame)
    }
}

/// Solid black with the "no image" lines centred
fn diagnostic_background(width: u32, height: u32, font: Option<&FontRenderer>) -> Canvas {
    let mut canvas = Canvas::solid(width, height, overlay::DIAGNOSTIC_BACKGROUND);
    let Some(font) = font else {
        return canvas;
    };

    let lines: Vec<RenderedText> = overlay::DIAGNOSTIC_LINES
        .iter()
        .map(|line| font.render_text(line, overlay::DIAGNOSTIC_TEXT_SIZE, overlay::DIAGNOSTIC_FOREGROUND))
        .collect();
    let block_height: i32 = lines.iter().map(|line| line.height as i32).sum();
    let mut y = (height as i32 - block_height) / 2;
    for line in &lines {
        let x = (width as i32 - line.width as i32) / 2;
        canvas.draw(line, x, y);
        y += line.height as i32;
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::path::PathBuf;

    fn snapshot(show_mask: bool) -> Arc<ConfigSnapshot> {
        Arc::new(ConfigSnapshot {
            show_mask,
            ..ConfigSnapshot::default()
        })
    }

    fn source(width: u32, height: u32, pixel: [u8; 4]) -> SourceImage {
        SourceImage {
            path: PathBuf::from("test.png"),
            pixels: RgbaImage::from_pixel(width, height, Rgba(pixel)),
        }
    }

    #[test]
    fn test_cover_layout_wider_source_crops_sides() {
        let layout = cover_layout((4000, 1000), (1920, 1080));
        assert_eq!(layout.scaled_height, 1080);
        assert_eq!(layout.scaled_width, 4320);
        assert_eq!(layout.crop_x, (4320 - 1920) / 2);
        assert_eq!(layout.crop_y, 0);
    }

    #[test]
    fn test_cover_layout_taller_source_crops_top_and_bottom() {
        let layout = cover_layout((1000, 2000), (1920, 1080));
        assert_eq!(layout.scaled_width, 1920);
        assert_eq!(layout.scaled_height, 3840);
        assert_eq!(layout.crop_x, 0);
        assert_eq!(layout.crop_y, (3840 - 1080) / 2);
    }

    #[test]
    fn test_cover_layout_same_aspect_needs_no_crop() {
        let layout = cover_layout((960, 540), (1920, 1080));
        assert_eq!(
            layout,
            CoverLayout { scaled_width: 1920, scaled_height: 1080, crop_x: 0, crop_y: 0 }
        );
    }

    #[test]
    fn test_text_origin_for_every_alignment() {
        let area = Rect::new(50, 50, 1000, 500);
        let (w, h) = (200, 100);
        assert_eq!(text_origin(TextAlignment::TopLeft, area, w, h), (50, 50));
        assert_eq!(text_origin(TextAlignment::TopCenter, area, w, h), (450, 50));
        assert_eq!(text_origin(TextAlignment::TopRight, area, w, h), (850, 50));
        assert_eq!(text_origin(TextAlignment::BottomLeft, area, w, h), (50, 450));
        assert_eq!(text_origin(TextAlignment::BottomCenter, area, w, h), (450, 450));
        assert_eq!(text_origin(TextAlignment::BottomRight, area, w, h), (850, 450));
        assert_eq!(text_origin(TextAlignment::Center, area, w, h), (450, 250));
    }

    #[test]
    fn test_cover_canvas_has_display_size_and_premultiplies() {
        let canvas = Canvas::cover(&source(8, 2, [200, 100, 50, 255]), 4, 4);
        assert_eq!((canvas.width, canvas.height), (4, 4));
        assert_eq!(canvas.pixels.len(), 16);
        let near = |value: u32, expected: u32| value.abs_diff(expected) <= 1;
        assert!(canvas.pixels.iter().all(|&p| {
            p >> 24 == 0xFF && near((p >> 16) & 0xFF, 200) && near((p >> 8) & 0xFF, 100) && near(p & 0xFF, 50)
        }));

        let translucent = Canvas::cover(&source(2, 2, [255, 255, 255, 128]), 2, 2);
        assert_eq!(translucent.pixels[0], 0x80808080);
    }

    #[test]
    fn test_darken_blends_black() {
        let mut canvas = Canvas::solid(2, 1, 0xFFFFFFFF);
        canvas.darken(80);
        // 255 * 175 / 255 = 175
        assert_eq!(canvas.pixels[0], 0xFFAFAFAF);

        let mut clear = Canvas::solid(1, 1, 0x00000000);
        clear.darken(80);
        assert_eq!(clear.pixels[0], 0x50000000);
    }

    #[test]
    fn test_draw_clips_and_blends() {
        let mut canvas = Canvas::solid(3, 3, 0xFF000000);
        let text = RenderedText {
            width: 2,
            height: 2,
            data: vec![0xFFFFFFFF, 0x00000000, 0x80808080, 0xFFFF0000],
        };
        canvas.draw(&text, 2, 2);
        assert_eq!(canvas.pixels[8], 0xFFFFFFFF);
        assert_eq!(canvas.pixels[0], 0xFF000000);

        canvas.draw(&text, -1, -1);
        // Only the bottom-right text pixel lands on (0, 0)
        assert_eq!(canvas.pixels[0], 0xFFFF0000);

        let mut canvas = Canvas::solid(1, 1, 0xFF000000);
        let half = RenderedText { width: 1, height: 1, data: vec![0x80808080] };
        canvas.draw(&half, 0, 0);
        assert_eq!(canvas.pixels[0], 0xFF808080);
    }

    #[test]
    fn test_bgra_byte_order() {
        let canvas = Canvas::solid(1, 1, 0xAA112233);
        assert_eq!(canvas.to_bgra_bytes(), vec![0x33, 0x22, 0x11, 0xAA]);
    }

    #[test]
    fn test_diagnostic_background_without_image() {
        let mut composer = FrameComposer::new(8, 6, snapshot(false), None, None);
        let frame = composer.compose("12:00").unwrap();
        assert!(frame.pixels.iter().all(|&p| p == overlay::DIAGNOSTIC_BACKGROUND));
    }

    #[test]
    fn test_mask_applied_to_image_background() {
        let image = source(4, 4, [255, 255, 255, 255]);
        let mut masked = FrameComposer::new(4, 4, snapshot(true), Some(&image), None);
        let mut plain = FrameComposer::new(4, 4, snapshot(false), Some(&image), None);
        assert_eq!(masked.compose("09:30").unwrap().pixels[0], 0xFFAFAFAF);
        assert_eq!(plain.compose("09:30").unwrap().pixels[0], 0xFFFFFFFF);
    }

    #[test]
    fn test_compose_only_when_clock_changes() {
        let mut composer = FrameComposer::new(4, 4, snapshot(true), None, None);
        assert!(composer.compose("10:00").is_some());
        assert!(composer.compose("10:00").is_none());
        assert!(composer.compose("10:01").is_some());
    }
}
