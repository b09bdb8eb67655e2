//! Small value types shared across modules

/// One active display surface as reported by the window system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub name: String,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub primary: bool,
}

impl DisplayInfo {
    pub fn new(name: impl Into<String>, x: i16, y: i16, width: u16, height: u16) -> Self {
        Self {
            name: name.into(),
            x,
            y,
            width,
            height,
            primary: false,
        }
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

/// Axis-aligned rectangle in surface pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Shrink by `margin` on every side, never below zero size
    pub fn inset(&self, margin: i32) -> Self {
        Self {
            x: self.x + margin,
            y: self.y + margin,
            width: (self.width - 2 * margin).max(0),
            height: (self.height - 2 * margin).max(0),
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_primary_flag() {
        let display = DisplayInfo::new("DP-0", 0, 0, 2560, 1440);
        assert!(!display.primary);
        assert!(display.with_primary(true).primary);
    }

    #[test]
    fn test_inset_shrinks_all_sides() {
        let rect = Rect::new(0, 0, 1920, 1080).inset(50);
        assert_eq!(rect, Rect::new(50, 50, 1820, 980));
        assert_eq!(rect.right(), 1870);
        assert_eq!(rect.bottom(), 1030);
    }

    #[test]
    fn test_inset_never_negative() {
        let rect = Rect::new(0, 0, 60, 40).inset(50);
        assert_eq!(rect.width, 0);
        assert_eq!(rect.height, 0);
    }
}
