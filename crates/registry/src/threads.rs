// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subsystem thread tables.
//!
//! Each subsystem may attach one fixed-capacity table of its live worker
//! threads. A single registry mutex serializes every mutation and read;
//! entries stay densely packed by swapping the last entry into a freed
//! slot. Memory samples read the OS-reported stack footprint and store
//! it as both virtual and resident bytes.

use kiln_logging::Logger;
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

/// Maximum worker threads tracked per subsystem.
pub const MAX_SERVICE_THREADS: usize = 32;

/// Table labels keep at most this many bytes of the subsystem name.
const LABEL_MAX_BYTES: usize = 31;

/// Optional per-thread descriptions are capped at this many bytes.
const DESCRIPTION_MAX_BYTES: usize = 32;

/// Subsystem label the thread registry logs under.
const THREAD_SUBSYSTEM: &str = "ThreadMgmt";

/// Handle to one subsystem's thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadTableId(pub(crate) usize);

#[derive(Debug, Clone)]
struct ThreadEntry {
    thread: ThreadId,
    tid: i64,
    virtual_bytes: u64,
    resident_bytes: u64,
    description: Option<String>,
}

#[derive(Debug, Default)]
struct TableState {
    label: String,
    entries: Vec<ThreadEntry>,
    total_virtual: u64,
    total_resident: u64,
}

impl TableState {
    fn recompute_totals(&mut self) {
        self.total_virtual = self.entries.iter().map(|e| e.virtual_bytes).sum();
        self.total_resident = self.entries.iter().map(|e| e.resident_bytes).sum();
    }
}

/// Aggregate counters for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableTotals {
    pub threads: usize,
    pub virtual_bytes: u64,
    pub resident_bytes: u64,
}

/// Registry of every subsystem's thread table.
pub struct ThreadRegistry {
    logger: Arc<Logger>,
    tables: Mutex<Vec<TableState>>,
    /// Set by [`ThreadRegistry::free_all`]; suppresses lifecycle TRACE
    /// logs during final teardown.
    final_shutdown: AtomicBool,
}

impl ThreadRegistry {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self {
            logger,
            tables: Mutex::new(Vec::new()),
            final_shutdown: AtomicBool::new(false),
        }
    }

    /// Create an empty table labeled with the subsystem name, truncated
    /// to the label cap.
    pub fn create_table(&self, subsystem: &str) -> ThreadTableId {
        let mut label = subsystem.to_string();
        truncate_bytes(&mut label, LABEL_MAX_BYTES);

        let mut tables = self.tables.lock();
        tables.push(TableState { label, ..TableState::default() });
        ThreadTableId(tables.len() - 1)
    }

    pub fn label(&self, id: ThreadTableId) -> Option<String> {
        self.tables.lock().get(id.0).map(|t| t.label.clone())
    }

    /// Record the calling thread in a table.
    ///
    /// A full table is a logged no-op, never fatal. Returns whether the
    /// thread was recorded.
    pub fn register_current(&self, id: ThreadTableId, description: Option<&str>) -> bool {
        let thread = std::thread::current().id();
        let tid = os::current_tid();
        let description = description.map(|d| {
            let mut d = d.to_string();
            truncate_bytes(&mut d, DESCRIPTION_MAX_BYTES);
            d
        });

        let (added, label) = {
            let mut tables = self.tables.lock();
            let Some(table) = tables.get_mut(id.0) else {
                return false;
            };
            if table.entries.len() >= MAX_SERVICE_THREADS {
                (false, table.label.clone())
            } else {
                table.entries.push(ThreadEntry {
                    thread,
                    tid,
                    virtual_bytes: 0,
                    resident_bytes: 0,
                    description,
                });
                (true, table.label.clone())
            }
        };

        if !added {
            self.logger.log(
                Some(THREAD_SUBSYSTEM),
                Some("thread table for %s is full (%u slots)"),
                kiln_core::LogPriority::Error,
                &[label.as_str().into(), MAX_SERVICE_THREADS.into()],
            );
        } else if !self.is_final_shutdown() {
            self.logger.log(
                Some(THREAD_SUBSYSTEM),
                Some("thread %u registered with %s"),
                kiln_core::LogPriority::Trace,
                &[(tid.max(0) as u64).into(), label.as_str().into()],
            );
        }
        added
    }

    /// Remove the calling thread from a table.
    pub fn remove_current(&self, id: ThreadTableId) {
        self.remove(id, std::thread::current().id());
    }

    /// Remove a thread by handle, swapping the last entry into its slot.
    pub fn remove(&self, id: ThreadTableId, thread: ThreadId) {
        let label = {
            let mut tables = self.tables.lock();
            let Some(table) = tables.get_mut(id.0) else {
                return;
            };
            let Some(pos) = table.entries.iter().position(|e| e.thread == thread) else {
                return;
            };
            table.entries.swap_remove(pos);
            table.recompute_totals();
            table.label.clone()
        };

        if !self.is_final_shutdown() {
            self.logger.log(
                Some(THREAD_SUBSYSTEM),
                Some("thread retired from %s"),
                kiln_core::LogPriority::Trace,
                &[label.as_str().into()],
            );
        }
    }

    pub fn thread_count(&self, id: ThreadTableId) -> usize {
        self.tables.lock().get(id.0).map(|t| t.entries.len()).unwrap_or(0)
    }

    pub fn totals(&self, id: ThreadTableId) -> Option<TableTotals> {
        self.tables.lock().get(id.0).map(|t| TableTotals {
            threads: t.entries.len(),
            virtual_bytes: t.total_virtual,
            resident_bytes: t.total_resident,
        })
    }

    /// Refresh one table's memory samples.
    ///
    /// Threads that no longer exist are removed without logging. For
    /// survivors the OS-reported stack size is stored as both virtual
    /// and resident bytes; the stack footprint is the field of interest.
    pub fn sample_metrics(&self, id: ThreadTableId) {
        let mut tables = self.tables.lock();
        let Some(table) = tables.get_mut(id.0) else {
            return;
        };

        let mut i = 0;
        while i < table.entries.len() {
            let tid = table.entries[i].tid;
            if !os::thread_alive(tid) {
                table.entries.swap_remove(i);
                continue;
            }
            let stack = os::stack_bytes(tid);
            table.entries[i].virtual_bytes = stack;
            table.entries[i].resident_bytes = stack;
            i += 1;
        }
        table.recompute_totals();
    }

    /// Human-readable summary of every table and the grand total.
    pub fn report_all(&self) -> String {
        let tables = self.tables.lock();
        let mut out = String::from("THREAD REGISTRY:\n");
        let mut threads = 0;
        let mut virt = 0u64;
        let mut res = 0u64;

        for table in tables.iter() {
            let _ = writeln!(
                out,
                "  {}: {} threads, {} virtual bytes, {} resident bytes",
                table.label,
                table.entries.len(),
                table.total_virtual,
                table.total_resident,
            );
            for entry in &table.entries {
                if let Some(desc) = &entry.description {
                    let _ = writeln!(out, "    tid {} ({desc})", entry.tid);
                }
            }
            threads += table.entries.len();
            virt += table.total_virtual;
            res += table.total_resident;
        }

        let _ = write!(out, "TOTAL: {threads} threads, {virt} virtual bytes, {res} resident bytes");
        out
    }

    /// Enter final-shutdown mode and re-initialize every table.
    ///
    /// Subsequent register/remove calls stay silent; the tables remain
    /// usable until the process exits.
    pub fn free_all(&self) {
        self.final_shutdown.store(true, Ordering::SeqCst);
        let mut tables = self.tables.lock();
        for table in tables.iter_mut() {
            table.entries.clear();
            table.recompute_totals();
        }
    }

    pub fn is_final_shutdown(&self) -> bool {
        self.final_shutdown.load(Ordering::SeqCst)
    }
}

/// Truncate a string to at most `max` bytes on a char boundary.
fn truncate_bytes(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(target_os = "linux")]
mod os {
    use std::path::Path;

    pub(super) fn current_tid() -> i64 {
        i64::from(nix::unistd::gettid().as_raw())
    }

    /// A thread is live iff its task directory still exists.
    pub(super) fn thread_alive(tid: i64) -> bool {
        tid > 0 && Path::new(&format!("/proc/self/task/{tid}")).exists()
    }

    /// OS-reported stack size for a task, zero when unavailable.
    pub(super) fn stack_bytes(tid: i64) -> u64 {
        let Ok(status) = std::fs::read_to_string(format!("/proc/self/task/{tid}/status")) else {
            return 0;
        };
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmStk:") {
                let kib: u64 = rest
                    .trim()
                    .trim_end_matches("kB")
                    .trim()
                    .parse()
                    .unwrap_or(0);
                return kib * 1024;
            }
        }
        0
    }
}

#[cfg(not(target_os = "linux"))]
mod os {
    /// No portable thread id; reads as zero with no error.
    pub(super) fn current_tid() -> i64 {
        0
    }

    /// Without a task list to consult, assume threads stay alive until
    /// explicitly removed.
    pub(super) fn thread_alive(_tid: i64) -> bool {
        true
    }

    pub(super) fn stack_bytes(_tid: i64) -> u64 {
        0
    }
}

#[cfg(test)]
#[path = "threads_tests.rs"]
mod tests;
