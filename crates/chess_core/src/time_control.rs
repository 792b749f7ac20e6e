//! Search budgets for engine requests and game time controls.
//!
//! A [`SearchBudget`] bounds a single engine request (depth, time, nodes).
//! A [`TimeControl`] describes the clock a game is played with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Limits that control when an engine should stop searching.
///
/// Engines stop when any limit is reached. A budget with no limit at all
/// asks for an unbounded (`infinite`) search, which only makes sense when
/// the caller enforces its own deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum search depth in plies (half-moves)
    pub depth: Option<u8>,
    /// Maximum time allowed for this move
    pub move_time: Option<Duration>,
    /// Maximum nodes to search
    pub nodes: Option<u64>,
}

impl SearchBudget {
    /// Create a budget with only a depth constraint.
    pub fn depth(depth: u8) -> Self {
        Self {
            depth: Some(depth),
            ..Self::default()
        }
    }

    /// Create a budget with both depth and time constraints.
    pub fn depth_and_time(depth: u8, move_time: Duration) -> Self {
        Self {
            depth: Some(depth),
            move_time: Some(move_time),
            nodes: None,
        }
    }

    /// Create a budget with only a time constraint.
    pub fn time(move_time: Duration) -> Self {
        Self {
            move_time: Some(move_time),
            ..Self::default()
        }
    }

    /// Create a budget with only a node constraint.
    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes: Some(nodes),
            ..Self::default()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.depth.is_none() && self.move_time.is_none() && self.nodes.is_none()
    }

    /// Render as a UCI `go` command.
    pub fn go_command(&self) -> String {
        if self.is_unbounded() {
            return "go infinite".to_string();
        }
        let mut cmd = String::from("go");
        if let Some(depth) = self.depth {
            cmd.push_str(&format!(" depth {depth}"));
        }
        if let Some(time) = self.move_time {
            cmd.push_str(&format!(" movetime {}", time.as_millis()));
        }
        if let Some(nodes) = self.nodes {
            cmd.push_str(&format!(" nodes {nodes}"));
        }
        cmd
    }

    /// Parse the arguments of a UCI `go` command. Clock-based arguments
    /// (`wtime`, `btime`, ...) and unknown tokens are ignored.
    pub fn from_go_args(args: &[&str]) -> Self {
        let mut budget = Self::default();
        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1).copied().unwrap_or("");
            match args[i] {
                "depth" => {
                    budget.depth = value.parse().ok();
                    i += 1;
                }
                "movetime" => {
                    budget.move_time = value.parse().ok().map(Duration::from_millis);
                    i += 1;
                }
                "nodes" => {
                    budget.nodes = value.parse().ok();
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        budget
    }
}

/// Time control settings for a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    /// Initial time in seconds
    pub initial_time: u64,
    /// Increment per move in seconds
    pub increment: u64,
}

impl TimeControl {
    pub fn new(minutes: u64, increment_secs: u64) -> Self {
        Self {
            initial_time: minutes * 60,
            increment: increment_secs,
        }
    }

    /// Unlimited time
    pub fn unlimited() -> Self {
        Self {
            initial_time: 0,
            increment: 0,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.initial_time == 0
    }

    pub fn initial(&self) -> Duration {
        Duration::from_secs(self.initial_time)
    }

    pub fn increment(&self) -> Duration {
        Duration::from_secs(self.increment)
    }
}

impl Default for TimeControl {
    fn default() -> Self {
        Self::new(10, 5) // Rapid 10+5
    }
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unlimited() {
            write!(f, "Unlimited")
        } else {
            write!(f, "{}+{}", self.initial_time / 60, self.increment)
        }
    }
}

#[cfg(test)]
#[path = "time_control_tests.rs"]
mod time_control_tests;
