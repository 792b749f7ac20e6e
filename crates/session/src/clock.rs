//! Two-sided chess clock.
//!
//! The clock never reads the wall clock itself. The session driver measures
//! elapsed time with a monotonic source and feeds it in through
//! [`ChessClock::tick`], which keeps the clock deterministic under test.

use std::time::Duration;

use chess_core::{Color, TimeControl};
use serde::{Deserialize, Serialize};

/// Chess clock for both players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChessClock {
    /// Time control settings
    pub time_control: TimeControl,
    /// White's remaining time in milliseconds
    pub white_time_ms: u64,
    /// Black's remaining time in milliseconds
    pub black_time_ms: u64,
    /// Which side's clock is running
    pub running_for: Option<Color>,
    /// Unlimited games carry a disabled clock that never runs
    pub enabled: bool,
}

impl Default for ChessClock {
    fn default() -> Self {
        Self::new(TimeControl::default())
    }
}

impl ChessClock {
    pub fn new(time_control: TimeControl) -> Self {
        let initial_ms = time_control.initial_time * 1000;
        Self {
            time_control,
            white_time_ms: initial_ms,
            black_time_ms: initial_ms,
            running_for: None,
            enabled: !time_control.is_unlimited(),
        }
    }

    /// Run the clock for `color`, stopping the other side.
    pub fn start(&mut self, color: Color) {
        if self.enabled {
            self.running_for = Some(color);
        }
    }

    /// Stop both sides.
    pub fn pause(&mut self) {
        self.running_for = None;
    }

    pub fn is_running(&self) -> bool {
        self.running_for.is_some()
    }

    /// Credit the per-move increment to `color`.
    ///
    /// A side whose flag has already fallen gets nothing back.
    pub fn add_increment(&mut self, color: Color) {
        if !self.enabled || self.is_flagged(color) {
            return;
        }
        let increment_ms = self.time_control.increment * 1000;
        *self.slot(color) += increment_ms;
    }

    /// Charge `elapsed` to the running side.
    ///
    /// Returns the side whose remaining time crossed zero during this tick.
    /// Time never goes negative and a flag falls only once.
    pub fn tick(&mut self, elapsed: Duration) -> Option<Color> {
        let color = self.running_for?;
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let slot = self.slot(color);
        let before = *slot;
        *slot = before.saturating_sub(elapsed_ms);
        (before > 0 && *slot == 0).then_some(color)
    }

    pub fn remaining_time(&self, color: Color) -> Duration {
        Duration::from_millis(match color {
            Color::White => self.white_time_ms,
            Color::Black => self.black_time_ms,
        })
    }

    /// Check if a player has run out of time
    pub fn is_flagged(&self, color: Color) -> bool {
        self.enabled && self.remaining_time(color).is_zero()
    }

    fn slot(&mut self, color: Color) -> &mut u64 {
        match color {
            Color::White => &mut self.white_time_ms,
            Color::Black => &mut self.black_time_ms,
        }
    }

    /// Format time as MM:SS
    pub fn format_time(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;

        if duration.as_millis() < 10_000 {
            // Show tenths when under 10 seconds
            let tenths = (duration.as_millis() % 1000) / 100;
            format!("{}:{:02}.{}", mins, secs, tenths)
        } else {
            format!("{}:{:02}", mins, secs)
        }
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod clock_tests;
