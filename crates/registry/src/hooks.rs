// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin state-update helpers for the boot and shutdown scripts.
//!
//! These mark states from externally observed reality (live threads,
//! shutdown flags) without driving the subsystems themselves.

use crate::registry::SubsystemRegistry;
use crate::state::SubsystemState;
use std::fmt::Write as _;
use std::sync::atomic::Ordering;

/// Byte cap on the running-subsystems status block.
pub const STATUS_BUFFER_SIZE: usize = 4096;

impl SubsystemRegistry {
    /// Reconcile states with observed reality after boot.
    ///
    /// A threaded subsystem counts as up when its table has live
    /// threads; a passive one when its shutdown flag is clear. Anything
    /// observed up while still `Inactive` is marked `Running`.
    pub fn update_on_startup(&self) {
        for id in self.each_id() {
            let observed_up = self.observe_up(id);
            if observed_up && self.state(id) == Some(SubsystemState::Inactive) {
                self.mark_state(id, SubsystemState::Running);
            }
        }
    }

    /// Mark every running subsystem `Stopping` without touching the
    /// threads it owns.
    pub fn update_on_shutdown(&self) {
        for id in self.each_id() {
            if self.state(id) == Some(SubsystemState::Running) {
                self.mark_state(id, SubsystemState::Stopping);
            }
        }
    }

    /// Mark everything `Inactive` once teardown has finished.
    pub fn update_after_shutdown(&self) {
        for id in self.each_id() {
            if self.state(id) != Some(SubsystemState::Inactive) {
                self.mark_state(id, SubsystemState::Inactive);
            }
        }
    }

    /// Human-readable block listing the running subsystems with uptime
    /// and thread count, capped at [`STATUS_BUFFER_SIZE`] bytes.
    pub fn running_status(&self) -> String {
        let entries = self.running_entries();
        let total = self.count();

        let mut out = format!("RUNNING SUBSYSTEMS ({}/{total}):\n", entries.len());
        for (name, uptime, threads) in entries {
            let _ = writeln!(out, "  {name} up {uptime}, {threads} threads");
        }
        while out.len() > STATUS_BUFFER_SIZE {
            out.pop();
        }
        out
    }

    fn observe_up(&self, id: crate::registry::SubsystemId) -> bool {
        let snapshot = self.hook_snapshot(id);
        match snapshot {
            Some((Some(table), _)) => self.thread_registry().thread_count(table) > 0,
            Some((None, Some(flag))) => !flag.load(Ordering::SeqCst),
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
