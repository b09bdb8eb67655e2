//! TrueType font rendering using fontdue (pure Rust)

use anyhow::{Context, Result};
use fontconfig::Fontconfig;
use fontdue::{Font, FontSettings};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::constants::fonts;

/// Rendered text as ARGB bitmap
pub struct RenderedText {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>, // ARGB pixels (premultiplied alpha)
}

impl RenderedText {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Font renderer using fontdue
#[derive(Debug)]
pub struct FontRenderer {
    font: Font,
}

impl FontRenderer {
    /// Load a TrueType font from a file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let font_data = fs::read(path)
            .with_context(|| format!("Failed to read font file: {}", path.display()))?;

        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font {}: {}", path.display(), e))?;

        info!(path = %path.display(), "Loaded font");
        Ok(Self { font })
    }

    /// Resolve a bold sans-serif font via fontconfig, falling back to well-known paths
    pub fn from_system_font() -> Result<Self> {
        match find_bold_font() {
            Ok(path) => match Self::from_path(&path) {
                Ok(renderer) => return Ok(renderer),
                Err(e) => warn!(path = %path.display(), error = ?e, "Fontconfig font unusable, trying fallbacks"),
            },
            Err(e) => warn!(error = ?e, "Fontconfig lookup failed, trying fallbacks"),
        }

        for path in &fonts::FALLBACK_PATHS {
            if let Ok(renderer) = Self::from_path(Path::new(path)) {
                return Ok(renderer);
            }
        }

        Err(anyhow::anyhow!(
            "Could not find any system fonts. Tried fontconfig ({} {}) and hardcoded paths: {:?}",
            fonts::FAMILY,
            fonts::STYLE,
            fonts::FALLBACK_PATHS
        ))
    }

    /// Render a single line of text to an ARGB bitmap (transparent background)
    pub fn render_text(&self, text: &str, size: f32, fg_color: u32) -> RenderedText {
        if text.is_empty() || size <= 0.0 {
            return RenderedText::empty();
        }

        // Layout glyphs
        let mut glyphs = Vec::new();
        let mut x = 0.0f32;
        let mut max_ascent = 0i32;
        let mut max_descent = 0i32;

        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, size);

            let ascent = metrics.height as i32 + metrics.ymin;
            let descent = -metrics.ymin;
            max_ascent = max_ascent.max(ascent);
            max_descent = max_descent.max(descent);

            glyphs.push((x as i32 + metrics.xmin, metrics, bitmap));
            x += metrics.advance_width;
        }

        let width = x.ceil().max(0.0) as usize;
        let height = (max_ascent + max_descent).max(0) as usize;

        if width == 0 || height == 0 {
            return RenderedText::empty();
        }

        let mut data = vec![0x00000000; width * height];

        // Foreground is NOT premultiplied - raw ARGB
        let fg_a = ((fg_color >> 24) & 0xFF) as f32 / 255.0;
        let fg_r = ((fg_color >> 16) & 0xFF) as f32 / 255.0;
        let fg_g = ((fg_color >> 8) & 0xFF) as f32 / 255.0;
        let fg_b = (fg_color & 0xFF) as f32 / 255.0;

        for (x_offset, metrics, bitmap) in glyphs {
            // Baseline sits max_ascent below the top
            let baseline_y = max_ascent - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let px = x_offset + gx as i32;
                    let py = baseline_y + gy as i32;

                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }

                    let coverage = bitmap[gy * metrics.width + gx] as f32 / 255.0;
                    if coverage > 0.0 {
                        let alpha = (fg_a * coverage * 255.0) as u32;
                        let r = (fg_r * fg_a * coverage * 255.0) as u32;
                        let g = (fg_g * fg_a * coverage * 255.0) as u32;
                        let b = (fg_b * fg_a * coverage * 255.0) as u32;

                        let pixel = (alpha << 24) | (r << 16) | (g << 8) | b;
                        let slot = &mut data[(py as usize) * width + (px as usize)];
                        // Overlapping glyph edges keep the stronger coverage
                        if pixel >> 24 > *slot >> 24 {
                            *slot = pixel;
                        }
                    }
                }
            }
        }

        RenderedText {
            width,
            height,
            data,
        }
    }
}

/// Ask fontconfig for the configured family/style
fn find_bold_font() -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;
    let font = fc
        .find(fonts::FAMILY, Some(fonts::STYLE))
        .with_context(|| format!("No font matched '{} {}'", fonts::FAMILY, fonts::STYLE))?;
    debug!(name = %font.name, path = %font.path.display(), "Resolved font via fontconfig");
    Ok(font.path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn any_font() -> Option<FontRenderer> {
        FontRenderer::from_system_font().ok()
    }

    #[test]
    fn test_missing_font_file_is_error() {
        assert!(FontRenderer::from_path(Path::new("/nonexistent/font.ttf")).is_err());
    }

    #[test]
    fn test_empty_text_renders_nothing() {
        // Only runs where a system font is installed
        if let Some(font) = any_font() {
            assert!(font.render_text("", 40.0, 0xFFFFFFFF).is_empty());
            assert!(font.render_text("12:34", 0.0, 0xFFFFFFFF).is_empty());
        }
    }

    #[test]
    fn test_clock_text_scales_with_size() {
        if let Some(font) = any_font() {
            let small = font.render_text("12:34", 20.0, 0xFFFFFFFF);
            let large = font.render_text("12:34", 100.0, 0xFFFFFFFF);
            assert!(!small.is_empty());
            assert!(large.width > small.width);
            assert!(large.height > small.height);
            assert_eq!(large.data.len(), large.width * large.height);
            // Some pixels are opaque white, premultiplied
            assert!(large.data.contains(&0xFFFFFFFF));
        }
    }
}
