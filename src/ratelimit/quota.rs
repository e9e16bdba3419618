//! Quota definitions: how many requests fit in a window.

use serde::Serialize;
use std::time::Duration;

use crate::error::{Result, WardenError};

/// Default number of admitted requests per window.
pub const DEFAULT_LIMIT: u64 = 100;
/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// A request quota: at most `limit` admissions per `window`.
///
/// Both fields are guaranteed non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Quota {
    limit: u64,
    #[serde(rename = "window_ms", serialize_with = "serialize_millis")]
    window: Duration,
}

impl Quota {
    /// Create a quota, rejecting a zero limit, a zero window, or a window
    /// too long to count in `u64` milliseconds.
    pub fn new(limit: u64, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(WardenError::Config(
                "quota limit must be greater than 0".to_string(),
            ));
        }
        if window.as_millis() == 0 {
            return Err(WardenError::Config(
                "quota window must be at least 1ms".to_string(),
            ));
        }
        if u64::try_from(window.as_millis()).is_err() {
            return Err(WardenError::Config(format!(
                "quota window of {}s exceeds {}ms",
                window.as_secs(),
                u64::MAX
            )));
        }
        Ok(Self { limit, window })
    }

    /// Create a quota from a window expressed in milliseconds.
    pub fn from_millis(limit: u64, window_ms: u64) -> Result<Self> {
        Self::new(limit, Duration::from_millis(window_ms))
    }

    /// Maximum admissions per window.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds.
    pub fn window_millis(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
        }
    }
}

impl std::fmt::Display for Quota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}ms", self.limit, self.window_millis())
    }
}

fn serialize_millis<S: serde::Serializer>(
    window: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(window.as_millis() as u64)
}
