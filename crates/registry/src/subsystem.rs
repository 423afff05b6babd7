// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-subsystem contract.

use crate::state::SubsystemState;
use crate::threads::ThreadTableId;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// A subsystem's dependency list is bounded at this many names.
pub const MAX_DEPENDENCIES: usize = 16;

/// Init callback; `false` means startup failed.
pub type InitFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// Shutdown callback.
pub type ShutdownFn = Arc<dyn Fn() + Send + Sync>;

/// Everything a subsystem hands the registry at registration time.
///
/// All fields are optional: a passive subsystem may register with
/// nothing but its name.
#[derive(Default)]
pub struct SubsystemHooks {
    /// Thread table the subsystem records its workers in.
    pub threads: Option<ThreadTableId>,
    /// Main thread, joined by `stop` after the shutdown callback runs.
    pub main_thread: Option<JoinHandle<()>>,
    /// Flag the subsystem's threads poll; `stop` sets it before calling
    /// the shutdown callback.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    pub init: Option<InitFn>,
    pub shutdown: Option<ShutdownFn>,
}

impl SubsystemHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, table: ThreadTableId) -> Self {
        self.threads = Some(table);
        self
    }

    pub fn main_thread(mut self, handle: JoinHandle<()>) -> Self {
        self.main_thread = Some(handle);
        self
    }

    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    pub fn init(mut self, f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.init = Some(Arc::new(f));
        self
    }

    pub fn shutdown(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.shutdown = Some(Arc::new(f));
        self
    }
}

/// One registry slot.
pub(crate) struct SubsystemRecord {
    pub(crate) name: String,
    pub(crate) state: SubsystemState,
    pub(crate) state_changed: Instant,
    pub(crate) dependencies: Vec<String>,
    pub(crate) threads: Option<ThreadTableId>,
    pub(crate) main_thread: Option<JoinHandle<()>>,
    pub(crate) shutdown_flag: Option<Arc<AtomicBool>>,
    pub(crate) init: Option<InitFn>,
    pub(crate) shutdown: Option<ShutdownFn>,
}

impl SubsystemRecord {
    pub(crate) fn new(name: String, hooks: SubsystemHooks, now: Instant) -> Self {
        Self {
            name,
            state: SubsystemState::Inactive,
            state_changed: now,
            dependencies: Vec::new(),
            threads: hooks.threads,
            main_thread: hooks.main_thread,
            shutdown_flag: hooks.shutdown_flag,
            init: hooks.init,
            shutdown: hooks.shutdown,
        }
    }

    pub(crate) fn set_state(&mut self, state: SubsystemState, now: Instant) {
        self.state = state;
        self.state_changed = now;
    }
}
