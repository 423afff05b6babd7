// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The logging entry point, dispatch modes, and log groups.

use crate::buffer::RollingBuffer;
use crate::console::{self, LabelWidths};
use crate::format::{self, LogValue};
use crate::guards::{self, GroupFlagGuard, LoggingOpGuard};
use crate::queue::{QueueError, QueueRegistry, SYSTEM_LOG_QUEUE};
use crate::sink::{NullSink, OobSink};
use kiln_core::{CounterGroups, LogPriority, LoggingConfig, QueuedRecord, RecordCounter};
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Name of the subsystem that owns the queue consumer. While it is not
/// `Running`, the entry point stays in startup mode.
pub const LOGGING_SUBSYSTEM: &str = "Logging";

/// Substituted for a missing subsystem name.
const UNKNOWN_SUBSYSTEM: &str = "Unknown";

/// Substituted for a missing format string.
const NO_MESSAGE: &str = "No message";

/// The one message that forces startup-mode (synchronous) dispatch even
/// on a fully running server: by the time it is emitted the consumer is
/// already gone.
const SHUTDOWN_COMPLETE: &str = "Shutdown complete";

/// The logger's view of the subsystem registry.
///
/// Only the two short read paths the lock-ordering rules allow; the
/// registry crate implements this and is wired in at boot.
pub trait RegistryProbe: Send + Sync {
    fn is_empty(&self) -> bool;
    fn is_running_by_name(&self, name: &str) -> bool;
}

struct GroupState {
    active: bool,
    holder: Option<ThreadId>,
}

/// The logging pipeline's shared state.
///
/// One `Logger` is owned by the process runtime and shared via `Arc`;
/// the [`crate::install`]/[`crate::log`] pair provides the thin global
/// accessor for call sites that cannot thread the argument.
pub struct Logger {
    config: RwLock<LoggingConfig>,
    buffer: RollingBuffer,
    counter: RecordCounter,
    queues: QueueRegistry,
    console_sink: Mutex<Box<dyn Write + Send>>,
    oob: Box<dyn OobSink>,
    probe: RwLock<Option<Arc<dyn RegistryProbe>>>,
    server_running: AtomicBool,
    queue_shutdown: AtomicBool,
    /// Short critical section around single-record console emission.
    log_lock: Mutex<()>,
    /// Held for the duration of an entire log group.
    group_lock: Mutex<()>,
    group_state: Mutex<GroupState>,
    group_done: Condvar,
}

impl Logger {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config: RwLock::new(config),
            buffer: RollingBuffer::new(),
            counter: RecordCounter::new(),
            queues: QueueRegistry::new(),
            console_sink: Mutex::new(Box::new(std::io::stdout())),
            oob: Box::new(NullSink),
            probe: RwLock::new(None),
            server_running: AtomicBool::new(false),
            queue_shutdown: AtomicBool::new(false),
            log_lock: Mutex::new(()),
            group_lock: Mutex::new(()),
            group_state: Mutex::new(GroupState { active: false, holder: None }),
            group_done: Condvar::new(),
        }
    }

    /// Replace the console byte sink (stdout in production, a capture
    /// buffer in tests).
    pub fn with_console_sink(mut self, sink: Box<dyn Write + Send>) -> Self {
        self.console_sink = Mutex::new(sink);
        self
    }

    /// Wire the out-of-band external sink.
    pub fn with_oob_sink(mut self, sink: Box<dyn OobSink>) -> Self {
        self.oob = sink;
        self
    }

    /// Wire the subsystem registry probe. Until this is called the entry
    /// point treats the registry as empty and stays in startup mode.
    pub fn set_registry_probe(&self, probe: Arc<dyn RegistryProbe>) {
        *self.probe.write() = Some(probe);
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn queues(&self) -> &QueueRegistry {
        &self.queues
    }

    pub fn config_snapshot(&self) -> LoggingConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, config: LoggingConfig) {
        *self.config.write() = config;
    }

    /// Mark the server as running; part of leaving startup mode.
    pub fn mark_server_started(&self) {
        self.server_running.store(true, Ordering::SeqCst);
    }

    pub fn mark_server_stopped(&self) {
        self.server_running.store(false, Ordering::SeqCst);
    }

    pub fn is_server_running(&self) -> bool {
        self.server_running.load(Ordering::SeqCst)
    }

    /// Enter shutdown mode: every subsequent record is written
    /// synchronously and the consumer drains and exits.
    pub fn begin_queue_shutdown(&self) {
        self.queue_shutdown.store(true, Ordering::SeqCst);
    }

    pub fn queue_shutdown_active(&self) -> bool {
        self.queue_shutdown.load(Ordering::SeqCst)
    }

    /// The logging entry point.
    ///
    /// Callable from any thread at any point in the process lifetime.
    /// Never returns an error and never blocks longer than a bounded
    /// enqueue: every internal failure degrades to a dropped or
    /// truncated record.
    pub fn log(
        &self,
        subsystem: Option<&str>,
        format: Option<&str>,
        priority: LogPriority,
        args: &[LogValue],
    ) {
        // Anti-recursion backstop: inside a lock acquisition that itself
        // entered the log path, do nothing.
        if guards::in_mutex_operation() {
            return;
        }
        let _logging_op = LoggingOpGuard::enter();

        let subsystem = subsystem.unwrap_or(UNKNOWN_SUBSYSTEM);
        let format = format.unwrap_or(NO_MESSAGE);

        let expected = format::count_specifiers(format);
        if expected != args.len() {
            // A mismatch never aborts logging.
            eprintln!(
                "WARNING: format {format:?} expects {expected} argument(s) but {} supplied",
                args.len()
            );
        }

        self.wait_for_group();

        let details = format::render(format, args);
        let counter = CounterGroups::split(self.counter.next());

        // The out-of-band sink sees every record, before any filtering.
        if self.oob.is_enabled() {
            self.oob.send(subsystem, &details, priority);
        }

        let record = QueuedRecord::new(subsystem, details, priority, counter);

        if self.in_startup_mode(&record.details) {
            if priority.meets(self.config.read().startup_level) {
                self.emit_console(&record);
            }
            return;
        }

        if self.queue_shutdown_active() {
            self.emit_console(&record);
            return;
        }

        match self.queues.find(SYSTEM_LOG_QUEUE) {
            Some(queue) => match queue.enqueue(record.to_bytes(), priority) {
                Ok(()) => queue.notify(),
                Err(QueueError::Full) => self.console_fallback(&record),
            },
            None => self.console_fallback(&record),
        }
    }

    /// Begin a log group: until the returned guard drops, no other
    /// thread's records interleave with this thread's.
    pub fn group_begin(&self) -> LogGroup<'_> {
        let group_guard = self.group_lock.lock();
        {
            let mut state = self.group_state.lock();
            state.active = true;
            state.holder = Some(thread::current().id());
        }
        let flag = GroupFlagGuard::enter();
        let log_guard = self.log_lock.lock();
        LogGroup { logger: self, _log_guard: log_guard, _group_guard: group_guard, _flag: flag }
    }

    /// Startup mode applies while the server is not yet running, the
    /// registry is absent or empty, the `"Logging"` subsystem is not
    /// `Running`, or the record is the final shutdown message.
    fn in_startup_mode(&self, details: &str) -> bool {
        if !self.is_server_running() {
            return true;
        }
        let probe = self.probe.read();
        let Some(probe) = probe.as_ref() else {
            return true;
        };
        if probe.is_empty() {
            return true;
        }
        if !probe.is_running_by_name(LOGGING_SUBSYSTEM) {
            return true;
        }
        details == SHUTDOWN_COMPLETE
    }

    fn console_fallback(&self, record: &QueuedRecord) {
        if self.config.read().console.enabled {
            self.emit_console(record);
        }
    }

    /// Format one record, append it to the rolling buffer, and write it
    /// to the console sink.
    pub(crate) fn emit_console(&self, record: &QueuedRecord) {
        // The group holder already owns the log lock for the whole
        // bracket; re-locking here would self-deadlock.
        let _serialized: Option<MutexGuard<'_, ()>> =
            if guards::in_log_group() { None } else { Some(self.log_lock.lock()) };

        let widths = LabelWidths::from_config(Some(&self.config.read()));
        let line = console::format_line(
            record.counter(),
            record.priority,
            &record.subsystem,
            &record.details,
            widths,
        );
        self.buffer.push(&line);

        let mut sink = self.console_sink.lock();
        let _ = writeln!(sink, "{line}");
    }

    fn wait_for_group(&self) {
        if guards::in_log_group() {
            return;
        }
        let mut state = self.group_state.lock();
        while state.active && state.holder != Some(thread::current().id()) {
            self.group_done.wait(&mut state);
        }
    }
}

/// An open log group; dropping it ends the group.
///
/// Groups released in LIFO order never deadlock: the guard owns both
/// locks and releases them in acquisition-reverse order.
pub struct LogGroup<'a> {
    logger: &'a Logger,
    _log_guard: MutexGuard<'a, ()>,
    _group_guard: MutexGuard<'a, ()>,
    _flag: GroupFlagGuard,
}

impl Drop for LogGroup<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.logger.group_state.lock();
            state.active = false;
            state.holder = None;
        }
        self.logger.group_done.notify_all();
        // The lock guards and the TLS flag release as the fields drop.
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
