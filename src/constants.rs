//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Settings file and its documented defaults
pub mod config {
    /// File name of the settings store inside the per-user config directory
    pub const FILENAME: &str = "tttreminder.ini";

    pub const DEFAULT_INTERVAL_MINUTES: u64 = 20;
    pub const DEFAULT_DISPLAY_SECONDS: u64 = 20;
    pub const DEFAULT_FADE_MS: u64 = 1000;
    pub const DEFAULT_TEXT_COLOR: &str = "#FFFFFF";
    pub const DEFAULT_FONT_SIZE: u32 = 100;
    pub const DEFAULT_POSITION: &str = "Center";
    pub const DEFAULT_SHOW_MASK: bool = true;

    /// Upper bounds for the timing keys; larger values are rejected as invalid
    pub const MAX_INTERVAL_MINUTES: u64 = 525_600;
    pub const MAX_DISPLAY_SECONDS: u64 = 31_536_000;
    pub const MAX_FADE_MS: u64 = 3_600_000;

    /// Recognised keys
    pub mod keys {
        pub const INTERVAL_MINUTES: &str = "interval_minutes";
        pub const DISPLAY_SECONDS: &str = "display_seconds";
        pub const FADE_MS: &str = "fade_ms";
        pub const IMAGE_SOURCE: &str = "image_source";
        pub const TEXT_COLOR: &str = "text_color";
        pub const FONT_SIZE: &str = "font_size";
        pub const POSITION: &str = "position";
        pub const SHOW_MASK: &str = "show_mask";
    }
}

/// Overlay timing and appearance
pub mod overlay {
    use std::time::Duration;

    /// Period of the clock repaint tick while an overlay is alive
    pub const CLOCK_TICK: Duration = Duration::from_secs(1);

    /// `chrono` format of the clock text (24-hour, zero padded)
    pub const CLOCK_FORMAT: &str = "%H:%M";

    /// Inset of the text rectangle from every edge of the display
    pub const TEXT_MARGIN: i32 = 50;

    /// Alpha of the darkening mask (out of 255)
    pub const MASK_ALPHA: u8 = 80;

    /// Background of the diagnostic frame (opaque black, ARGB)
    pub const DIAGNOSTIC_BACKGROUND: u32 = 0xFF000000;

    /// Text color of the diagnostic frame (opaque white, ARGB)
    pub const DIAGNOSTIC_FOREGROUND: u32 = 0xFFFFFFFF;

    /// Pixel size of the diagnostic text
    pub const DIAGNOSTIC_TEXT_SIZE: f32 = 32.0;

    /// Lines shown when no image could be resolved
    pub const DIAGNOSTIC_LINES: [&str; 2] = ["No Image Found", "Check Logs"];
}

/// Event loop pacing
pub mod event_loop {
    use std::time::Duration;

    /// Frame interval while any overlay is fading
    pub const ANIMATION_FRAME: Duration = Duration::from_millis(16);

    /// Longest wait when nothing is animating
    pub const IDLE_WAIT: Duration = Duration::from_millis(250);
}

/// Image selection
pub mod images {
    /// Extensions accepted when picking from a directory (compared case-insensitively)
    pub const EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
}

/// Font discovery
pub mod fonts {
    /// Fontconfig family/style used for the clock
    pub const FAMILY: &str = "Sans";
    pub const STYLE: &str = "Bold";

    /// Last-resort bold font files for systems without a usable fontconfig
    pub const FALLBACK_PATHS: [&str; 6] = [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
        "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
        "/usr/share/fonts/noto/NotoSans-Bold.ttf",
    ];
}

/// X11 protocol and rendering constants
pub mod x11 {
    /// ARGB color depth (32-bit: 8 bits each for Alpha, Red, Green, Blue)
    pub const ARGB_DEPTH: u8 = 32;

    /// Override redirect flag for unmanaged windows
    pub const OVERRIDE_REDIRECT: u32 = 1;

    /// Fixed header size of a PutImage request in bytes
    pub const PUT_IMAGE_HEADER_BYTES: usize = 24;

    /// WM_CLASS instance and class, NUL separated
    pub const WM_CLASS: &[u8] = b"tttreminder\0tttreminder\0";

    /// RandR version that introduced GetMonitors
    pub const RANDR_MAJOR: u32 = 1;
    pub const RANDR_MINOR: u32 = 5;
}

/// System tray
pub mod tray {
    pub const ID: &str = "tttreminder";
    pub const TITLE: &str = "TwentyTwentyTwentyReminder";
    pub const ICON_NAME: &str = "alarm-symbolic";
}
