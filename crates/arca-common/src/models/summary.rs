//! Outcome record shared by the validator and every work stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated outcome of one attempt at a unit of work.
///
/// Errors are collected, never short-circuited, so operators see every
/// problem from a single pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkSummary {
    /// Whether this work was attempted at all
    pub attempted: bool,

    /// How many times this work has been attempted
    pub attempt_number: u32,

    /// When the current attempt began
    pub started_at: Option<DateTime<Utc>>,

    /// When the current attempt ended
    pub finished_at: Option<DateTime<Utc>>,

    /// Every error encountered, in order of discovery
    pub errors: Vec<String>,
}

impl WorkSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the beginning of an attempt.
    pub fn start(&mut self) {
        self.attempted = true;
        self.attempt_number += 1;
        self.started_at = Some(Utc::now());
        self.finished_at = None;
    }

    /// Mark the end of an attempt.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Record an error without aborting the work.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether an attempt ran and completed without errors.
    pub fn succeeded(&self) -> bool {
        self.attempted && self.finished_at.is_some() && !self.has_errors()
    }

    /// All errors joined for the work-item note field.
    pub fn all_errors_as_string(&self) -> String {
        self.errors.join("; ")
    }
}
