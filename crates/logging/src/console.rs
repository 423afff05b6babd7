// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The console line formatter.
//!
//! One line per record:
//! `[ sss hhh lll ]  YYYY-MM-DD HH:MM:SS.mmmZ  [ PRIORITY ]  [ SUBSYSTEM ]  message`
//! with both labels right-aligned to widths recomputed from the
//! configuration, falling back to fixed widths when it is unavailable.

use chrono::Utc;
use kiln_core::{CounterGroups, LogPriority, LoggingConfig};

/// Priority label column width when no configuration is available.
pub const PRIORITY_LABEL_FALLBACK_WIDTH: usize = 9;

/// Subsystem label column width when no configuration is available.
pub const SUBSYSTEM_LABEL_FALLBACK_WIDTH: usize = 18;

/// Label column widths `(priority, subsystem)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelWidths {
    pub priority: usize,
    pub subsystem: usize,
}

impl LabelWidths {
    /// Recompute from the configured tables; fall back to the built-in
    /// widths where the configuration has nothing to say.
    pub fn from_config(config: Option<&LoggingConfig>) -> Self {
        match config {
            Some(config) => Self {
                priority: LogPriority::NAME_TABLE
                    .iter()
                    .map(|name| name.len())
                    .max()
                    .unwrap_or(PRIORITY_LABEL_FALLBACK_WIDTH),
                subsystem: config
                    .subsystem_label_width()
                    .unwrap_or(SUBSYSTEM_LABEL_FALLBACK_WIDTH),
            },
            None => Self {
                priority: PRIORITY_LABEL_FALLBACK_WIDTH,
                subsystem: SUBSYSTEM_LABEL_FALLBACK_WIDTH,
            },
        }
    }
}

/// Format one console line with the current UTC wall-clock time.
pub fn format_line(
    counter: CounterGroups,
    priority: LogPriority,
    subsystem: &str,
    message: &str,
    widths: LabelWidths,
) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S%.3fZ");
    format!(
        "[ {counter} ]  {timestamp}  [ {priority:>pw$} ]  [ {subsystem:>sw$} ]  {message}",
        priority = priority.label(),
        pw = widths.priority,
        sw = widths.subsystem,
    )
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
