//! Image selection for a reminder cycle
//!
//! A source path names either one image file or a directory; for a directory one
//! image is picked uniformly from its direct children with a known extension.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::constants::images;
use crate::error::ReminderError;

/// Decoded image shared by every overlay of one cycle
#[derive(Debug)]
pub struct SourceImage {
    pub path: PathBuf,
    pub pixels: RgbaImage,
}

/// Picks and decodes the image for a cycle
pub trait ImageSelector {
    fn select(&self, source: &str) -> Result<Arc<SourceImage>, ReminderError>;
}

/// Selector backed by the local filesystem
#[derive(Debug, Default)]
pub struct FsImageSelector;

impl ImageSelector for FsImageSelector {
    fn select(&self, source: &str) -> Result<Arc<SourceImage>, ReminderError> {
        let path = resolve_image_path(source, &mut rand::thread_rng())?;
        decode(&path).map(Arc::new)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| images::EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Resolve a source path to one image file
pub fn resolve_image_path<R: Rng + ?Sized>(source: &str, rng: &mut R) -> Result<PathBuf, ReminderError> {
    if source.trim().is_empty() {
        return Err(ReminderError::ImageUnavailable("image_source is empty".to_string()));
    }
    let path = Path::new(source);

    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(ReminderError::ImageUnavailable(format!(
            "{} is neither a file nor a directory",
            path.display()
        )));
    }

    let entries = fs::read_dir(path).map_err(|e| {
        ReminderError::ImageUnavailable(format!("cannot list {}: {e}", path.display()))
    })?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|candidate| candidate.is_file() && has_image_extension(candidate))
        .collect();
    // read_dir order is unspecified, keep selection reproducible for a given rng
    candidates.sort();

    let chosen = candidates.choose(rng).cloned().ok_or_else(|| {
        ReminderError::ImageUnavailable(format!("no images inside {}", path.display()))
    })?;
    debug!(candidates = candidates.len(), path = %chosen.display(), "Selected image");
    Ok(chosen)
}

/// Decode an image file into RGBA pixels
pub fn decode(path: &Path) -> Result<SourceImage, ReminderError> {
    let pixels = image::open(path)
        .map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to decode image");
            ReminderError::ImageUnavailable(format!("cannot decode {}: {e}", path.display()))
        })?
        .to_rgba8();
    info!(
        path = %path.display(),
        width = pixels.width(),
        height = pixels.height(),
        "Loaded reminder image"
    );
    Ok(SourceImage {
        path: path.to_path_buf(),
        pixels,
    })
}
