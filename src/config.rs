//! Reminder configuration
//!
//! [`ConfigSnapshot`] is the immutable value every component reads. It is produced by a
//! [`ConfigSource`]; the production source is [`ConfigStore`], an INI-style settings file
//! that is created with the documented defaults on first run.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::constants::config::{self as defaults, keys};
use crate::error::ReminderError;

/// Where the clock text sits inside the margin-inset rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlignment {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
    #[default]
    Center,
}

impl TextAlignment {
    /// Case-insensitive parse; anything unrecognised is `Center`
    pub fn from_setting(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "topleft" => Self::TopLeft,
            "topcenter" => Self::TopCenter,
            "topright" => Self::TopRight,
            "bottomleft" => Self::BottomLeft,
            "bottomcenter" => Self::BottomCenter,
            "bottomright" => Self::BottomRight,
            _ => Self::Center,
        }
    }
}

/// Non-premultiplied ARGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextColor {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TextColor {
    pub const WHITE: Self = Self { a: 0xFF, r: 0xFF, g: 0xFF, b: 0xFF };

    /// Parse `#RRGGBB` or `#AARRGGBB`
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Self { a: 0xFF, r: byte(0)?, g: byte(2)?, b: byte(4)? }),
            8 => Some(Self { a: byte(0)?, r: byte(2)?, g: byte(4)?, b: byte(6)? }),
            _ => None,
        }
    }

    /// Packed `0xAARRGGBB`, the format the font renderer takes
    pub fn argb(&self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 0xFF {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }
}

/// Immutable configuration values, swapped as a whole on reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// Minutes between reminders, 0 disables automatic firing
    pub interval_minutes: u64,
    /// Seconds the overlay holds at full opacity
    pub display_seconds: u64,
    /// Length of each fade in milliseconds
    pub fade_ms: u64,
    /// Image file, or a directory to pick from
    pub image_source: String,
    pub text_color: TextColor,
    pub font_size: u32,
    pub alignment: TextAlignment,
    pub show_mask: bool,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::DEFAULT_INTERVAL_MINUTES,
            display_seconds: defaults::DEFAULT_DISPLAY_SECONDS,
            fade_ms: defaults::DEFAULT_FADE_MS,
            image_source: String::new(),
            text_color: TextColor::WHITE,
            font_size: defaults::DEFAULT_FONT_SIZE,
            alignment: TextAlignment::Center,
            show_mask: defaults::DEFAULT_SHOW_MASK,
        }
    }
}

impl ConfigSnapshot {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.min(defaults::MAX_INTERVAL_MINUTES) * 60)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_secs(self.display_seconds.min(defaults::MAX_DISPLAY_SECONDS))
    }

    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms.min(defaults::MAX_FADE_MS))
    }

    /// Parse settings text. Fields that fail to parse keep their defaults and are
    /// reported in the returned list.
    pub fn parse(contents: &str) -> (Self, Vec<ReminderError>) {
        let mut snapshot = Self::default();
        let mut issues = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let mut value = value.trim();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value = &value[1..value.len() - 1];
            }
            debug!(key = %key, value = %value, "Settings entry");

            let result = match key {
                keys::INTERVAL_MINUTES => parse_count(key, value, defaults::MAX_INTERVAL_MINUTES)
                    .map(|v| snapshot.interval_minutes = v),
                keys::DISPLAY_SECONDS => parse_count(key, value, defaults::MAX_DISPLAY_SECONDS)
                    .map(|v| snapshot.display_seconds = v),
                keys::FADE_MS => parse_count(key, value, defaults::MAX_FADE_MS).map(|v| snapshot.fade_ms = v),
                keys::FONT_SIZE => parse_count(key, value, u32::MAX as u64).map(|v| snapshot.font_size = v as u32),
                keys::IMAGE_SOURCE => {
                    snapshot.image_source = value.to_string();
                    Ok(())
                }
                keys::TEXT_COLOR => {
                    match TextColor::parse_hex(value) {
                        Some(color) => snapshot.text_color = color,
                        None => warn!(value = %value, "Unrecognised text_color, using white"),
                    }
                    Ok(())
                }
                keys::POSITION => {
                    snapshot.alignment = TextAlignment::from_setting(value);
                    Ok(())
                }
                keys::SHOW_MASK => {
                    snapshot.show_mask = value.eq_ignore_ascii_case("true");
                    Ok(())
                }
                _ => Ok(()),
            };
            if let Err(issue) = result {
                issues.push(issue);
            }
        }

        (snapshot, issues)
    }
}

fn invalid(key: &str, value: &str) -> ReminderError {
    ReminderError::InvalidNumericField {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Non-negative integer no larger than `max`
fn parse_count(key: &str, value: &str, max: u64) -> Result<u64, ReminderError> {
    match value.parse::<u64>() {
        Ok(v) if v <= max => Ok(v),
        _ => Err(invalid(key, value)),
    }
}

/// Contents written when the settings file does not exist yet
pub fn default_settings_text() -> String {
    format!(
        "[General]\n\
         {}={}\n\
         {}={}\n\
         {}={}\n\
         {}=\n\
         \n\
         [Theme]\n\
         {}={}\n\
         {}={}\n\
         {}={}\n\
         {}={}\n",
        keys::INTERVAL_MINUTES, defaults::DEFAULT_INTERVAL_MINUTES,
        keys::DISPLAY_SECONDS, defaults::DEFAULT_DISPLAY_SECONDS,
        keys::FADE_MS, defaults::DEFAULT_FADE_MS,
        keys::IMAGE_SOURCE,
        keys::TEXT_COLOR, defaults::DEFAULT_TEXT_COLOR,
        keys::FONT_SIZE, defaults::DEFAULT_FONT_SIZE,
        keys::POSITION, defaults::DEFAULT_POSITION,
        keys::SHOW_MASK, defaults::DEFAULT_SHOW_MASK,
    )
}

/// Anything that can produce a fresh configuration snapshot
pub trait ConfigSource {
    fn load(&self) -> Result<ConfigSnapshot, ReminderError>;
}

/// Settings file on disk
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Per-user location used when no `--config` is given
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(defaults::FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_defaults(&self) -> Result<(), ReminderError> {
        let unavailable = |source| ReminderError::ConfigUnavailable {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
        fs::write(&self.path, default_settings_text()).map_err(unavailable)
    }
}

impl ConfigSource for ConfigStore {
    fn load(&self) -> Result<ConfigSnapshot, ReminderError> {
        debug!(path = %self.path.display(), "Loading settings");

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // First run: seed the store, the defaults apply either way
                match self.write_defaults() {
                    Ok(()) => info!(path = %self.path.display(), "Created default settings file"),
                    Err(e) => warn!(error = %e, "Failed to create default settings file"),
                }
                return Ok(ConfigSnapshot::default());
            }
            Err(source) => {
                return Err(ReminderError::ConfigUnavailable {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let (snapshot, issues) = ConfigSnapshot::parse(&contents);
        for issue in &issues {
            warn!(error = %issue, "Ignoring settings value, keeping default");
        }
        debug!(
            image_source = %snapshot.image_source,
            interval_minutes = snapshot.interval_minutes,
            display_seconds = snapshot.display_seconds,
            fade_ms = snapshot.fade_ms,
            text_color = %snapshot.text_color,
            font_size = snapshot.font_size,
            alignment = ?snapshot.alignment,
            show_mask = snapshot.show_mask,
            "Resolved settings"
        );
        Ok(snapshot)
    }
}
