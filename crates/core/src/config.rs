// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only view of the logging configuration contract.
//!
//! Parsing, `${env.VAR}` interpolation, and unit suffixes are owned by the
//! external configuration collaborator; these types only deserialize the
//! already-resolved object it exposes.

use crate::priority::LogPriority;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;

/// Per-destination filter settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    pub enabled: bool,
    pub default_level: LogPriority,
    /// Per-subsystem threshold overrides, in configuration order.
    #[serde(default)]
    pub subsystems: IndexMap<String, LogPriority>,
}

impl DestinationConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            default_level: LogPriority::None,
            subsystems: IndexMap::new(),
        }
    }

    /// Threshold for a subsystem, falling back to the destination default.
    pub fn threshold_for(&self, subsystem: &str) -> LogPriority {
        self.subsystems.get(subsystem).copied().unwrap_or(self.default_level)
    }

    /// Whether a record passes this destination's filter.
    pub fn passes(&self, subsystem: &str, priority: LogPriority) -> bool {
        self.enabled && priority.meets(self.threshold_for(subsystem))
    }
}

/// The logging block of the server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub console: DestinationConfig,
    pub file: DestinationConfig,
    pub database: DestinationConfig,
    /// Threshold applied while the queue consumer is not yet running.
    pub startup_level: LogPriority,
    /// Append target for the file destination.
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console: DestinationConfig {
                enabled: true,
                default_level: LogPriority::Trace,
                subsystems: IndexMap::new(),
            },
            file: DestinationConfig::disabled(),
            database: DestinationConfig::disabled(),
            startup_level: LogPriority::Debug,
            file_path: None,
        }
    }
}

impl LoggingConfig {
    /// Longest configured subsystem label across all destinations.
    ///
    /// The console formatter uses this to recompute its label column;
    /// `None` when no subsystem is configured anywhere.
    pub fn subsystem_label_width(&self) -> Option<usize> {
        [&self.console, &self.file, &self.database]
            .iter()
            .flat_map(|dest| dest.subsystems.keys())
            .map(|name| name.len())
            .max()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
