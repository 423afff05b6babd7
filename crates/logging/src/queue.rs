// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The log queue collaborator.
//!
//! A bounded FIFO of opaque payloads with a priority per entry.
//! Producers enqueue and signal; a single consumer sleeps on the queue's
//! condition variable and drains in order. Queues are addressed by name
//! through a [`QueueRegistry`]; the system queue is [`SYSTEM_LOG_QUEUE`].

use indexmap::IndexMap;
use kiln_core::LogPriority;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Name the logging entry point looks up for normal dispatch.
pub const SYSTEM_LOG_QUEUE: &str = "SystemLog";

/// Default bound for newly registered queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is at capacity")]
    Full,
}

/// One queued payload.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub payload: Vec<u8>,
    pub priority: LogPriority,
}

/// Bounded FIFO with an associated consumer condition variable.
pub struct LogQueue {
    name: String,
    capacity: usize,
    entries: Mutex<VecDeque<QueueEntry>>,
    available: Condvar,
}

impl LogQueue {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            entries: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounded enqueue; never blocks the producer.
    pub fn enqueue(&self, payload: Vec<u8>, priority: LogPriority) -> Result<(), QueueError> {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            return Err(QueueError::Full);
        }
        entries.push_back(QueueEntry { payload, priority });
        Ok(())
    }

    /// Non-blocking dequeue in FIFO order.
    pub fn dequeue(&self) -> Option<QueueEntry> {
        self.entries.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wake the consumer.
    pub fn notify(&self) {
        self.available.notify_one();
    }

    /// Consumer side: take the next entry, sleeping up to `timeout` for
    /// one to arrive. The bounded wait keeps shutdown flags observable.
    pub fn wait_for_entry(&self, timeout: Duration) -> Option<QueueEntry> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.pop_front() {
            return Some(entry);
        }
        let _ = self.available.wait_for(&mut entries, timeout);
        entries.pop_front()
    }
}

/// Named queue lookup.
#[derive(Default)]
pub struct QueueRegistry {
    queues: Mutex<IndexMap<String, Arc<LogQueue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a queue under its name, replacing any previous holder.
    pub fn register(&self, queue: Arc<LogQueue>) {
        self.queues.lock().insert(queue.name().to_string(), queue);
    }

    /// Find a queue by name.
    pub fn find(&self, name: &str) -> Option<Arc<LogQueue>> {
        self.queues.lock().get(name).cloned()
    }

    /// Find the named queue, creating it with the default capacity when
    /// absent.
    pub fn find_or_register(&self, name: &str) -> Arc<LogQueue> {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get(name) {
            return Arc::clone(queue);
        }
        let queue = Arc::new(LogQueue::new(name, DEFAULT_QUEUE_CAPACITY));
        queues.insert(name.to_string(), Arc::clone(&queue));
        queue
    }

    /// Drop a named queue; the logging entry point falls back to the
    /// console once the lookup misses.
    pub fn remove(&self, name: &str) -> Option<Arc<LogQueue>> {
        self.queues.lock().shift_remove(name)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
