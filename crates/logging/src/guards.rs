// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-thread re-entrancy flags.
//!
//! Three independent thread-local booleans protect the log path:
//! *logging_operation* marks a thread that is inside the entry point,
//! *mutex_operation* marks a lock acquisition that must not log, and
//! *log_group* marks the holder of the group lock. Each is exposed
//! through an RAII guard that restores the prior value on drop, panic
//! unwind included.

use std::cell::Cell;

thread_local! {
    static LOGGING_OPERATION: Cell<bool> = const { Cell::new(false) };
    static MUTEX_OPERATION: Cell<bool> = const { Cell::new(false) };
    static LOG_GROUP: Cell<bool> = const { Cell::new(false) };
}

/// Whether this thread is inside the logging entry point.
pub fn in_logging_operation() -> bool {
    LOGGING_OPERATION.get()
}

/// Whether this thread is inside a lock acquisition that must not log.
pub fn in_mutex_operation() -> bool {
    MUTEX_OPERATION.get()
}

/// Whether this thread holds the log group lock.
pub fn in_log_group() -> bool {
    LOG_GROUP.get()
}

/// Marks the current thread as inside the logging entry point.
pub struct LoggingOpGuard {
    prior: bool,
}

impl LoggingOpGuard {
    pub fn enter() -> Self {
        let prior = LOGGING_OPERATION.replace(true);
        Self { prior }
    }
}

impl Drop for LoggingOpGuard {
    fn drop(&mut self) {
        LOGGING_OPERATION.set(self.prior);
    }
}

/// Marks the current thread as inside a lock acquisition; any log call
/// issued while this guard lives is silently dropped by the entry point.
pub struct MutexOpGuard {
    prior: bool,
}

impl MutexOpGuard {
    pub fn enter() -> Self {
        let prior = MUTEX_OPERATION.replace(true);
        Self { prior }
    }
}

impl Drop for MutexOpGuard {
    fn drop(&mut self) {
        MUTEX_OPERATION.set(self.prior);
    }
}

/// Marks the current thread as the log group holder.
pub(crate) struct GroupFlagGuard {
    prior: bool,
}

impl GroupFlagGuard {
    pub(crate) fn enter() -> Self {
        let prior = LOG_GROUP.replace(true);
        Self { prior }
    }
}

impl Drop for GroupFlagGuard {
    fn drop(&mut self) {
        LOG_GROUP.set(self.prior);
    }
}

#[cfg(test)]
#[path = "guards_tests.rs"]
mod tests;
