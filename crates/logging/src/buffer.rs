// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rolling in-memory buffer of formatted log lines.

use crate::format;
use crate::guards::MutexOpGuard;
use parking_lot::Mutex;

/// Number of lines the buffer retains.
pub const LOG_BUFFER_SIZE: usize = 500;

/// Stored lines are truncated to this many bytes.
pub const MAX_LOG_LINE_LENGTH: usize = 2048;

struct BufferState {
    lines: Vec<String>,
    /// Index of the next write.
    head: usize,
    /// Number of valid entries, saturating at [`LOG_BUFFER_SIZE`].
    count: usize,
}

/// Fixed-capacity ring of the most recent formatted lines.
///
/// The line storage is allocated once at construction and never grows.
/// Readers iterate backward from `head - 1`, newest first.
pub struct RollingBuffer {
    inner: Mutex<BufferState>,
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingBuffer {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BufferState {
                lines: vec![String::new(); LOG_BUFFER_SIZE],
                head: 0,
                count: 0,
            }),
        }
    }

    /// Append a formatted line, overwriting the oldest once full.
    pub fn push(&self, line: &str) {
        let mut stored = line.to_string();
        format::truncate_to(&mut stored, MAX_LOG_LINE_LENGTH);

        let mut state = self.inner.lock();
        let head = state.head;
        state.lines[head] = stored;
        state.head = (head + 1) % LOG_BUFFER_SIZE;
        state.count = (state.count + 1).min(LOG_BUFFER_SIZE);
    }

    /// Number of valid lines currently buffered.
    pub fn len(&self) -> usize {
        self.inner.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every buffered line containing `name`, newest first, joined with
    /// newlines. Empty string when nothing matches.
    pub fn query_by_subsystem(&self, name: &str) -> String {
        let _mutex_op = MutexOpGuard::enter();
        let state = self.inner.lock();
        let mut matches = Vec::new();
        for line in Self::iter_newest_first(&state) {
            if line.contains(name) {
                matches.push(line.as_str());
            }
        }
        matches.join("\n")
    }

    /// The most recent `n` lines, newest first, clamped to the number of
    /// valid entries.
    pub fn query_last(&self, n: usize) -> Vec<String> {
        let _mutex_op = MutexOpGuard::enter();
        let state = self.inner.lock();
        Self::iter_newest_first(&state).take(n).cloned().collect()
    }

    fn iter_newest_first(state: &BufferState) -> impl Iterator<Item = &String> {
        let head = state.head;
        (0..state.count)
            .map(move |i| &state.lines[(head + LOG_BUFFER_SIZE - 1 - i) % LOG_BUFFER_SIZE])
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
