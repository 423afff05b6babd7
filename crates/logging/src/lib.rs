// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kiln-logging: the asynchronous logging pipeline.
//!
//! Records enter through [`Logger::log`] (or the process-global [`log`]
//! shim) from any thread at any point in the process lifecycle. Before
//! the queue consumer exists they are written synchronously through the
//! console formatter; once the `"Logging"` subsystem is running they are
//! enqueued as JSON payloads and routed to the configured destinations by
//! a dedicated consumer thread. A fixed-size rolling buffer keeps the most
//! recent formatted lines queryable in memory, and per-thread guard flags
//! keep the whole path safe against re-entry.

pub mod buffer;
pub mod console;
pub mod consumer;
pub mod format;
pub mod guards;
pub mod logger;
pub mod queue;
pub mod sink;

pub use buffer::{RollingBuffer, LOG_BUFFER_SIZE, MAX_LOG_LINE_LENGTH};
pub use consumer::{ConsumerHandle, ConsumerMetrics, DatabaseSink, NullDatabaseSink};
pub use format::{LogValue, DEFAULT_LOG_ENTRY_SIZE};
pub use logger::{LogGroup, Logger, RegistryProbe, LOGGING_SUBSYSTEM};
pub use queue::{LogQueue, QueueError, QueueRegistry, DEFAULT_QUEUE_CAPACITY, SYSTEM_LOG_QUEUE};
pub use sink::{NullSink, OobSink};

use kiln_core::LogPriority;
use parking_lot::RwLock;
use std::sync::Arc;

static GLOBAL: RwLock<Option<Arc<Logger>>> = parking_lot::const_rwlock(None);

/// Install the process-global logger used by [`log`].
///
/// The owned [`Logger`] remains the primary interface; this accessor
/// exists for call sites where threading the `Arc` argument is
/// impractical (the entry point must be callable from any stack depth).
pub fn install(logger: Arc<Logger>) {
    *GLOBAL.write() = Some(logger);
}

/// Remove the process-global logger. Subsequent [`log`] calls are no-ops.
pub fn uninstall() {
    *GLOBAL.write() = None;
}

/// The currently installed process-global logger, if any.
pub fn global() -> Option<Arc<Logger>> {
    GLOBAL.read().clone()
}

/// Log through the process-global logger; silently a no-op when none is
/// installed.
pub fn log(subsystem: &str, priority: LogPriority, format: &str, args: &[LogValue]) {
    if let Some(logger) = global() {
        logger.log(Some(subsystem), Some(format), priority, args);
    }
}

/// Log through the process-global logger with inline argument conversion.
///
/// ```ignore
/// log_this!("WebServer", LogPriority::State, "listening on port %d", 8080);
/// ```
#[macro_export]
macro_rules! log_this {
    ($subsystem:expr, $priority:expr, $format:expr $(, $arg:expr)* $(,)?) => {
        $crate::log(
            $subsystem,
            $priority,
            $format,
            &[$($crate::LogValue::from($arg)),*],
        )
    };
}
