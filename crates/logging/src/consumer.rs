// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The queue consumer: a dedicated thread that drains the system log
//! queue and routes each record to its destinations.

use crate::console::{self, LabelWidths};
use crate::logger::Logger;
use crate::queue::{LogQueue, QueueEntry, SYSTEM_LOG_QUEUE};
use kiln_core::QueuedRecord;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound on one condvar sleep, so the shutdown flag is observed
/// promptly even without a signal.
const WAIT_SLICE: Duration = Duration::from_millis(200);

/// External database destination. Failures are the collaborator's
/// problem; the consumer only counts what it handed over.
pub trait DatabaseSink: Send + Sync {
    fn write(&self, record: &QueuedRecord);
}

/// Database destination used when no collaborator is wired.
pub struct NullDatabaseSink;

impl DatabaseSink for NullDatabaseSink {
    fn write(&self, _record: &QueuedRecord) {}
}

/// Routing counters, shared with the status surface.
#[derive(Debug, Clone, Default)]
pub struct ConsumerMetrics {
    pub console_written: u64,
    pub file_written: u64,
    pub database_written: u64,
    pub parse_failures: u64,
}

/// Append-mode file destination, flushed after every write.
///
/// The handle lives inside the consumer thread's stack; dropping it —
/// on normal exit or a panic unwinding past it — flushes and closes the
/// file.
struct FileSink {
    file: File,
}

impl FileSink {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.file, "{line}");
        let _ = self.file.flush();
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

/// Handle to the running consumer thread.
pub struct ConsumerHandle {
    logger: Arc<Logger>,
    queue: Arc<LogQueue>,
    metrics: Arc<Mutex<ConsumerMetrics>>,
    handle: Option<JoinHandle<()>>,
}

impl ConsumerHandle {
    /// Start the consumer against the logger's `"SystemLog"` queue,
    /// creating the queue when it does not exist yet.
    pub fn spawn(
        logger: Arc<Logger>,
        database: Arc<dyn DatabaseSink>,
    ) -> io::Result<ConsumerHandle> {
        let queue = logger.queues().find_or_register(SYSTEM_LOG_QUEUE);
        let metrics = Arc::new(Mutex::new(ConsumerMetrics::default()));

        let handle = {
            let logger = Arc::clone(&logger);
            let queue = Arc::clone(&queue);
            let metrics = Arc::clone(&metrics);
            thread::Builder::new()
                .name("log-consumer".to_string())
                .spawn(move || run(&logger, &queue, database.as_ref(), &metrics))?
        };

        Ok(ConsumerHandle { logger, queue, metrics, handle: Some(handle) })
    }

    pub fn metrics(&self) -> ConsumerMetrics {
        self.metrics.lock().clone()
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Set the shutdown flag, signal once, and join. The consumer
    /// drains whatever is still queued before it exits.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.logger.begin_queue_shutdown();
            self.queue.notify();
            let _ = handle.join();
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    logger: &Logger,
    queue: &LogQueue,
    database: &dyn DatabaseSink,
    metrics: &Mutex<ConsumerMetrics>,
) {
    // Opened before the loop so one guard owns the handle for the whole
    // consumer lifetime, closing it on every exit path.
    let config = logger.config_snapshot();
    let mut file = match (config.file.enabled, &config.file_path) {
        (true, Some(path)) => FileSink::open(path).ok(),
        _ => None,
    };

    loop {
        if let Some(entry) = queue.wait_for_entry(WAIT_SLICE) {
            route(logger, &entry, file.as_mut(), database, metrics);
            while let Some(entry) = queue.dequeue() {
                route(logger, &entry, file.as_mut(), database, metrics);
            }
        }
        if logger.queue_shutdown_active() && queue.is_empty() {
            break;
        }
    }
}

fn route(
    logger: &Logger,
    entry: &QueueEntry,
    file: Option<&mut FileSink>,
    database: &dyn DatabaseSink,
    metrics: &Mutex<ConsumerMetrics>,
) {
    let record = match QueuedRecord::from_bytes(&entry.payload) {
        Ok(record) => record,
        Err(_) => {
            metrics.lock().parse_failures += 1;
            return;
        }
    };

    let config = logger.config_snapshot();

    if record.log_console && config.console.passes(&record.subsystem, record.priority) {
        logger.emit_console(&record);
        metrics.lock().console_written += 1;
    }

    if record.log_file && config.file.passes(&record.subsystem, record.priority) {
        if let Some(file) = file {
            let line = console::format_line(
                record.counter(),
                record.priority,
                &record.subsystem,
                &record.details,
                LabelWidths::from_config(Some(&config)),
            );
            file.write_line(&line);
            metrics.lock().file_written += 1;
        }
    }

    if record.log_database && config.database.passes(&record.subsystem, record.priority) {
        database.write(&record);
        metrics.lock().database_written += 1;
    }
}

#[cfg(test)]
#[path = "consumer_tests.rs"]
mod tests;
