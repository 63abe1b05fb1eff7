//! Playback speed multipliers.
//!
//! A closed enum instead of a raw float: the UI offers exactly these five
//! steps, and a closed set keeps tick-interval math exact.

use std::fmt;
use std::time::Duration;

/// Playback speed multiplier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Speed {
    /// 0.5×
    Half,
    /// 1×
    #[default]
    Normal,
    /// 1.5×
    OneAndAHalf,
    /// 2×
    Double,
    /// 4×
    Quadruple,
}

impl Speed {
    /// All speeds, slowest first.
    pub const ALL: [Self; 5] = [
        Self::Half,
        Self::Normal,
        Self::OneAndAHalf,
        Self::Double,
        Self::Quadruple,
    ];

    /// The numeric multiplier.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Half => 0.5,
            Self::Normal => 1.0,
            Self::OneAndAHalf => 1.5,
            Self::Double => 2.0,
            Self::Quadruple => 4.0,
        }
    }

    /// The speed for a multiplier, if it is one of the supported steps.
    #[must_use]
    pub fn from_multiplier(multiplier: f64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| (s.multiplier() - multiplier).abs() < f64::EPSILON)
    }

    /// Interval between replay ticks for a given base tick length.
    ///
    /// `base_tick_ms / multiplier`, rounded to whole milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn tick_interval(self, base_tick_ms: u64) -> Duration {
        let ms = (base_tick_ms as f64 / self.multiplier()).round() as u64;
        Duration::from_millis(ms.max(1))
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.multiplier())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
