// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log record priorities.
//!
//! Priorities form a totally ordered set. `All` and `None` are bookends
//! usable only as filter thresholds: `All` passes everything, `None`
//! passes nothing. Records themselves carry `Trace` through `Quiet`.

use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority of a log record, most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogPriority {
    /// Threshold bookend: every priority passes.
    All,
    Trace,
    Debug,
    State,
    Alert,
    Error,
    Fatal,
    Quiet,
    /// Threshold bookend: no priority passes.
    None,
}

crate::simple_display! {
    LogPriority {
        All => "ALL",
        Trace => "TRACE",
        Debug => "DEBUG",
        State => "STATE",
        Alert => "ALERT",
        Error => "ERROR",
        Fatal => "FATAL",
        Quiet => "QUIET",
        None => "NONE",
    }
}

impl LogPriority {
    /// Built-in name table for displayable record priorities, used when the
    /// configuration is unavailable.
    pub const NAME_TABLE: [&'static str; 7] =
        ["TRACE", "DEBUG", "STATE", "ALERT", "ERROR", "FATAL", "QUIET"];

    /// Uppercase display label.
    pub fn label(self) -> &'static str {
        match self {
            LogPriority::All => "ALL",
            LogPriority::Trace => "TRACE",
            LogPriority::Debug => "DEBUG",
            LogPriority::State => "STATE",
            LogPriority::Alert => "ALERT",
            LogPriority::Error => "ERROR",
            LogPriority::Fatal => "FATAL",
            LogPriority::Quiet => "QUIET",
            LogPriority::None => "NONE",
        }
    }

    /// Integer encoding used by the configuration contract.
    pub fn value(self) -> i64 {
        match self {
            LogPriority::All => 0,
            LogPriority::Trace => 1,
            LogPriority::Debug => 2,
            LogPriority::State => 3,
            LogPriority::Alert => 4,
            LogPriority::Error => 5,
            LogPriority::Fatal => 6,
            LogPriority::Quiet => 7,
            LogPriority::None => 8,
        }
    }

    /// Decode the configuration integer encoding.
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(LogPriority::All),
            1 => Some(LogPriority::Trace),
            2 => Some(LogPriority::Debug),
            3 => Some(LogPriority::State),
            4 => Some(LogPriority::Alert),
            5 => Some(LogPriority::Error),
            6 => Some(LogPriority::Fatal),
            7 => Some(LogPriority::Quiet),
            8 => Some(LogPriority::None),
            _ => Option::None,
        }
    }

    /// Whether a record at this priority passes a filter threshold.
    ///
    /// `All` as a threshold always passes, `None` never does; otherwise
    /// the record must be at or above the threshold.
    pub fn meets(self, threshold: LogPriority) -> bool {
        match threshold {
            LogPriority::All => true,
            LogPriority::None => false,
            _ => self >= threshold,
        }
    }
}

// The configuration contract exposes levels as integers, so the serde
// codec uses the integer encoding rather than variant names.
impl Serialize for LogPriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl<'de> Deserialize<'de> for LogPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriorityVisitor;

        impl Visitor<'_> for PriorityVisitor {
            type Value = LogPriority;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a log priority integer in 0..=8")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<LogPriority, E> {
                LogPriority::from_value(v)
                    .ok_or_else(|| E::custom(format!("log priority out of range: {v}")))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<LogPriority, E> {
                let v = i64::try_from(v)
                    .map_err(|_| E::custom(format!("log priority out of range: {v}")))?;
                self.visit_i64(v)
            }
        }

        deserializer.deserialize_i64(PriorityVisitor)
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
