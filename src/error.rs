//! Recoverable failures of the reminder engine
//!
//! None of these terminate the process. Each is logged where it is handled and
//! the scheduler or overlay carries on with a fallback.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReminderError {
    /// Settings store could not be read or written
    #[error("configuration unavailable at {}: {source}", path.display())]
    ConfigUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No usable image could be resolved or decoded
    #[error("no usable image: {0}")]
    ImageUnavailable(String),

    /// Display enumeration yielded nothing to draw on
    #[error("no active displays")]
    NoDisplays,

    /// An integer key held something that is not a non-negative integer
    #[error("invalid numeric value {value:?} for '{key}'")]
    InvalidNumericField { key: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_input() {
        let err = ReminderError::InvalidNumericField {
            key: "fade_ms".to_string(),
            value: "fast".to_string(),
        };
        assert_eq!(err.to_string(), "invalid numeric value \"fast\" for 'fade_ms'");

        let err = ReminderError::ConfigUnavailable {
            path: PathBuf::from("/tmp/x.ini"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().starts_with("configuration unavailable at /tmp/x.ini"));
    }
}
