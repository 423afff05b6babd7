// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The JSON record placed on the log queue.

use crate::counter::CounterGroups;
use crate::priority::LogPriority;
use serde::{Deserialize, Serialize};

/// One log record in transit between the entry point and the queue
/// consumer.
///
/// All three destination flags are true at construction; the consumer
/// applies per-destination filtering when it routes the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRecord {
    pub subsystem: String,
    pub details: String,
    pub priority: LogPriority,
    pub counter_super: u16,
    pub counter_high: u16,
    pub counter_low: u16,
    #[serde(rename = "LogConsole")]
    pub log_console: bool,
    #[serde(rename = "LogFile")]
    pub log_file: bool,
    #[serde(rename = "LogDatabase")]
    pub log_database: bool,
}

impl QueuedRecord {
    pub fn new(
        subsystem: impl Into<String>,
        details: impl Into<String>,
        priority: LogPriority,
        counter: CounterGroups,
    ) -> Self {
        Self {
            subsystem: subsystem.into(),
            details: details.into(),
            priority,
            counter_super: counter.sup,
            counter_high: counter.high,
            counter_low: counter.low,
            log_console: true,
            log_file: true,
            log_database: true,
        }
    }

    /// Counter display groups carried by this record.
    pub fn counter(&self) -> CounterGroups {
        CounterGroups { sup: self.counter_super, high: self.counter_high, low: self.counter_low }
    }

    /// Serialize for the queue payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        // A struct of strings, ints, and bools cannot fail to serialize.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Parse a queue payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
