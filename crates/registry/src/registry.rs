// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The subsystem registry and lifecycle controller.
//!
//! One coarse lock guards the record table, its explicit capacity, and
//! every state transition. Subsystems are identified by integer id; any
//! path that releases the lock around a slow operation (an init or
//! shutdown callback, a join) re-resolves the record by id afterward,
//! because the table may have grown in between. Narration always happens
//! after the lock is dropped: the logging pipeline reads this registry
//! back through [`RegistryProbe`].

use crate::state::SubsystemState;
use crate::subsystem::{SubsystemHooks, SubsystemRecord, MAX_DEPENDENCIES};
use crate::threads::ThreadRegistry;
use kiln_core::{Clock, LogPriority};
use kiln_logging::{LogValue, Logger, RegistryProbe};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Capacity the record table jumps to on its first growth.
pub const INITIAL_REGISTRY_CAPACITY: usize = 8;

/// Yield between leaf-scan rounds in [`SubsystemRegistry::stop_all`].
const STOP_ALL_ROUND_DELAY: Duration = Duration::from_millis(10);

/// Subsystem label the registry logs under.
const REGISTRY_SUBSYSTEM: &str = "Registry";

/// Index-stable identifier for a registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsystemId(pub(crate) usize);

impl SubsystemId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for SubsystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("subsystem name must not be empty")]
    EmptyName,

    #[error("subsystem '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("no subsystem with id {0}")]
    BadId(usize),

    #[error("dependency name must not be empty")]
    EmptyDependency,

    #[error("dependency list for '{0}' is full ({MAX_DEPENDENCIES} max)")]
    DependencyListFull(String),

    #[error("'{subsystem}' is missing running dependencies: {}", missing.join(", "))]
    DependenciesNotRunning { subsystem: String, missing: Vec<String> },

    #[error("'{subsystem}' is still required by: {}", dependents.join(", "))]
    BlockedByDependents { subsystem: String, dependents: Vec<String> },

    #[error("init for '{0}' failed")]
    InitFailed(String),

    #[error("'{subsystem}' cannot move from {from} to {to}")]
    IllegalTransition { subsystem: String, from: SubsystemState, to: SubsystemState },
}

/// Operator-facing readiness record for the registry itself.
#[derive(Debug, Clone)]
pub struct Readiness {
    pub subsystem: String,
    pub ready: bool,
    pub messages: [String; 3],
}

struct RegistryInner {
    records: Vec<SubsystemRecord>,
    capacity: usize,
}

/// The process-wide subsystem catalog and lifecycle controller.
pub struct SubsystemRegistry {
    logger: Arc<Logger>,
    threads: Arc<ThreadRegistry>,
    clock: Arc<dyn Clock>,
    inner: Mutex<RegistryInner>,
}

impl SubsystemRegistry {
    pub fn new(logger: Arc<Logger>, threads: Arc<ThreadRegistry>) -> Self {
        Self::with_clock(logger, threads, Arc::new(kiln_core::SystemClock))
    }

    pub fn with_clock(
        logger: Arc<Logger>,
        threads: Arc<ThreadRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            logger,
            threads,
            clock,
            inner: Mutex::new(RegistryInner { records: Vec::new(), capacity: 0 }),
        }
    }

    pub fn thread_registry(&self) -> &Arc<ThreadRegistry> {
        &self.threads
    }

    /// Drop every record and reset count and capacity to zero.
    ///
    /// Name and dependency strings are freed by ownership; previously
    /// issued ids become invalid.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.records = Vec::new();
        inner.capacity = 0;
    }

    /// Register a subsystem. Ids are handed out in registration order
    /// and stay valid until [`SubsystemRegistry::reset`].
    pub fn register(
        &self,
        name: &str,
        hooks: SubsystemHooks,
    ) -> Result<SubsystemId, RegistryError> {
        if name.is_empty() {
            self.narrate(LogPriority::Error, "rejected registration with an empty name", &[]);
            return Err(RegistryError::EmptyName);
        }

        let id = {
            let mut inner = self.inner.lock();
            if inner.records.iter().any(|r| r.name == name) {
                drop(inner);
                self.narrate(
                    LogPriority::Error,
                    "subsystem %s is already registered",
                    &[name.into()],
                );
                return Err(RegistryError::AlreadyRegistered(name.to_string()));
            }
            if inner.records.len() == inner.capacity {
                inner.capacity = if inner.capacity == 0 {
                    INITIAL_REGISTRY_CAPACITY
                } else {
                    inner.capacity * 2
                };
                let grow = inner.capacity - inner.records.len();
                inner.records.reserve_exact(grow);
            }
            inner
                .records
                .push(SubsystemRecord::new(name.to_string(), hooks, self.clock.now()));
            SubsystemId(inner.records.len() - 1)
        };

        self.narrate(
            LogPriority::Debug,
            "registered subsystem %s with id %u",
            &[name.into(), id.0.into()],
        );
        Ok(id)
    }

    /// Append a dependency name. Idempotent: a name already present is
    /// accepted without a second entry. The dependency may name a
    /// subsystem that is not registered yet; resolution is deferred to
    /// start time.
    pub fn add_dependency(
        &self,
        id: SubsystemId,
        dependency: &str,
    ) -> Result<(), RegistryError> {
        if dependency.is_empty() {
            self.narrate(LogPriority::Error, "rejected empty dependency name", &[]);
            return Err(RegistryError::EmptyDependency);
        }

        let name = {
            let mut inner = self.inner.lock();
            let Some(record) = inner.records.get_mut(id.0) else {
                drop(inner);
                self.narrate_bad_id(id);
                return Err(RegistryError::BadId(id.0));
            };
            if record.dependencies.iter().any(|d| d == dependency) {
                return Ok(());
            }
            if record.dependencies.len() >= MAX_DEPENDENCIES {
                let name = record.name.clone();
                drop(inner);
                self.narrate(
                    LogPriority::Error,
                    "dependency list for %s is full (%u max)",
                    &[name.as_str().into(), MAX_DEPENDENCIES.into()],
                );
                return Err(RegistryError::DependencyListFull(name));
            }
            record.dependencies.push(dependency.to_string());
            record.name.clone()
        };

        self.narrate(
            LogPriority::Debug,
            "%s now depends on %s",
            &[name.as_str().into(), dependency.into()],
        );
        Ok(())
    }

    /// Start a subsystem: dependency check, `Starting`, init outside the
    /// lock, then `Running` or `Error`.
    ///
    /// Already `Running` or `Starting` is success. An `Error` subsystem
    /// may be retried.
    pub fn start(&self, id: SubsystemId) -> Result<(), RegistryError> {
        let (name, init) = {
            let mut inner = self.inner.lock();
            if id.0 >= inner.records.len() {
                drop(inner);
                self.narrate_bad_id(id);
                return Err(RegistryError::BadId(id.0));
            }
            if matches!(
                inner.records[id.0].state,
                SubsystemState::Running | SubsystemState::Starting
            ) {
                return Ok(());
            }

            let missing: Vec<String> = inner.records[id.0]
                .dependencies
                .iter()
                .filter(|dep| {
                    !inner
                        .records
                        .iter()
                        .any(|r| &r.name == *dep && r.state == SubsystemState::Running)
                })
                .cloned()
                .collect();
            if !missing.is_empty() {
                let name = inner.records[id.0].name.clone();
                drop(inner);
                self.narrate(
                    LogPriority::Error,
                    "cannot start %s, dependencies not running: %s",
                    &[name.as_str().into(), missing.join(", ").into()],
                );
                return Err(RegistryError::DependenciesNotRunning { subsystem: name, missing });
            }

            let now = self.clock.now();
            let record = &mut inner.records[id.0];
            record.set_state(SubsystemState::Starting, now);
            (record.name.clone(), record.init.clone())
        };

        self.narrate(LogPriority::Debug, "starting %s", &[name.as_str().into()]);

        // The init callback runs without the registry lock; other threads
        // may register or start subsystems meanwhile.
        let ok = init.map(|f| f()).unwrap_or(true);

        let mut inner = self.inner.lock();
        let now = self.clock.now();
        // Re-resolve by id: the table may have grown while unlocked.
        let Some(record) = inner.records.get_mut(id.0) else {
            return Err(RegistryError::BadId(id.0));
        };
        if ok {
            record.set_state(SubsystemState::Running, now);
            drop(inner);
            self.narrate(LogPriority::State, "subsystem %s is running", &[name.as_str().into()]);
            Ok(())
        } else {
            record.set_state(SubsystemState::Error, now);
            drop(inner);
            self.narrate(LogPriority::Error, "init for %s failed", &[name.as_str().into()]);
            Err(RegistryError::InitFailed(name))
        }
    }

    /// Stop a subsystem: dependent check, `Stopping`, then shutdown
    /// flag, shutdown callback, and main-thread join outside the lock,
    /// landing on `Inactive`.
    ///
    /// Already `Inactive` is success. A shutdown-callback failure is
    /// best-effort: the subsystem still ends `Inactive`.
    pub fn stop(&self, id: SubsystemId) -> Result<(), RegistryError> {
        let (name, flag, shutdown, main_thread) = {
            let mut inner = self.inner.lock();
            if id.0 >= inner.records.len() {
                drop(inner);
                self.narrate_bad_id(id);
                return Err(RegistryError::BadId(id.0));
            }
            if inner.records[id.0].state == SubsystemState::Inactive {
                return Ok(());
            }

            let name = inner.records[id.0].name.clone();
            let dependents: Vec<String> = inner
                .records
                .iter()
                .enumerate()
                .filter(|(i, r)| {
                    *i != id.0
                        && matches!(r.state, SubsystemState::Running | SubsystemState::Starting)
                        && r.dependencies.iter().any(|d| d == &name)
                })
                .map(|(_, r)| r.name.clone())
                .collect();
            if !dependents.is_empty() {
                drop(inner);
                self.narrate(
                    LogPriority::Error,
                    "cannot stop %s, still required by: %s",
                    &[name.as_str().into(), dependents.join(", ").into()],
                );
                return Err(RegistryError::BlockedByDependents { subsystem: name, dependents });
            }

            let now = self.clock.now();
            let record = &mut inner.records[id.0];
            // Only a running subsystem passes through Stopping; a Ready
            // or Error one is torn down directly.
            if record.state == SubsystemState::Running {
                record.set_state(SubsystemState::Stopping, now);
            }
            (
                record.name.clone(),
                record.shutdown_flag.clone(),
                record.shutdown.clone(),
                record.main_thread.take(),
            )
        };

        self.narrate(LogPriority::Alert, "stopping %s", &[name.as_str().into()]);

        if let Some(flag) = flag {
            flag.store(true, Ordering::SeqCst);
        }
        if let Some(shutdown) = shutdown {
            shutdown();
        }
        if let Some(handle) = main_thread {
            let _ = handle.join();
        }

        let mut inner = self.inner.lock();
        let now = self.clock.now();
        if let Some(record) = inner.records.get_mut(id.0) {
            record.set_state(SubsystemState::Inactive, now);
        }
        drop(inner);

        self.narrate(LogPriority::State, "subsystem %s stopped", &[name.as_str().into()]);
        Ok(())
    }

    /// Stop a subsystem after recursively stopping everything that
    /// (transitively) depends on it.
    pub fn stop_with_dependents(&self, id: SubsystemId) -> Result<(), RegistryError> {
        let name = self.name_of(id)?;

        loop {
            // The lock is released around the recursive call; the next
            // pass re-resolves everything by id.
            let dependent = {
                let inner = self.inner.lock();
                inner
                    .records
                    .iter()
                    .enumerate()
                    .find(|(i, r)| {
                        *i != id.0
                            && matches!(
                                r.state,
                                SubsystemState::Running | SubsystemState::Starting
                            )
                            && r.dependencies.iter().any(|d| d == &name)
                    })
                    .map(|(i, _)| SubsystemId(i))
            };
            match dependent {
                Some(dep) => self.stop_with_dependents(dep)?,
                None => break,
            }
        }

        self.stop(id)
    }

    /// Stop every running subsystem in dependency order: repeatedly stop
    /// a leaf (a running subsystem nothing running depends on), yield
    /// briefly, and rescan. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let mut stopped = 0;
        loop {
            let leaf = {
                let inner = self.inner.lock();
                inner
                    .records
                    .iter()
                    .enumerate()
                    .find(|(_, r)| {
                        r.state == SubsystemState::Running
                            && !inner.records.iter().any(|other| {
                                other.state == SubsystemState::Running
                                    && other.dependencies.iter().any(|d| d == &r.name)
                            })
                    })
                    .map(|(i, _)| SubsystemId(i))
            };
            match leaf {
                Some(id) => {
                    if self.stop(id).is_err() {
                        break;
                    }
                    stopped += 1;
                    std::thread::sleep(STOP_ALL_ROUND_DELAY);
                }
                None => break,
            }
        }
        stopped
    }

    /// Whether every listed dependency is `Running`. An invalid id is
    /// simply not satisfied.
    pub fn check_dependencies(&self, id: SubsystemId) -> bool {
        let inner = self.inner.lock();
        let Some(record) = inner.records.get(id.0) else {
            return false;
        };
        record.dependencies.iter().all(|dep| {
            inner
                .records
                .iter()
                .any(|r| &r.name == dep && r.state == SubsystemState::Running)
        })
    }

    /// Move an `Inactive` subsystem to the `Ready` pre-start snapshot;
    /// external readiness wiring only, never reached by `start`.
    pub fn mark_ready(&self, id: SubsystemId) -> Result<(), RegistryError> {
        let name = {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            let Some(record) = inner.records.get_mut(id.0) else {
                drop(inner);
                self.narrate_bad_id(id);
                return Err(RegistryError::BadId(id.0));
            };
            if !record.state.can_transition_to(SubsystemState::Ready) {
                let err = RegistryError::IllegalTransition {
                    subsystem: record.name.clone(),
                    from: record.state,
                    to: SubsystemState::Ready,
                };
                drop(inner);
                return Err(err);
            }
            record.set_state(SubsystemState::Ready, now);
            record.name.clone()
        };
        self.narrate(LogPriority::Debug, "subsystem %s is ready", &[name.as_str().into()]);
        Ok(())
    }

    pub fn is_running(&self, id: SubsystemId) -> bool {
        self.state(id) == Some(SubsystemState::Running)
    }

    pub fn is_running_by_name(&self, name: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .records
            .iter()
            .any(|r| r.name == name && r.state == SubsystemState::Running)
    }

    pub fn state(&self, id: SubsystemId) -> Option<SubsystemState> {
        self.inner.lock().records.get(id.0).map(|r| r.state)
    }

    pub fn id_by_name(&self, name: &str) -> Option<SubsystemId> {
        let inner = self.inner.lock();
        inner.records.iter().position(|r| r.name == name).map(SubsystemId)
    }

    pub fn count(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Readiness record for operator display.
    pub fn readiness(&self) -> Readiness {
        let (count, running) = {
            let inner = self.inner.lock();
            let running = inner
                .records
                .iter()
                .filter(|r| r.state == SubsystemState::Running)
                .count();
            (inner.records.len(), running)
        };
        Readiness {
            subsystem: REGISTRY_SUBSYSTEM.to_string(),
            ready: true,
            messages: [
                "Registry lock initialized".to_string(),
                format!("{count} subsystems registered"),
                format!("{running} subsystems running"),
            ],
        }
    }

    /// Narrate every subsystem's state, time in state, dependencies, and
    /// thread footprint. Trouble states escalate the log priority.
    pub fn status_report(&self) {
        struct StatusLine {
            priority: LogPriority,
            text: String,
        }

        let lines: Vec<StatusLine> = {
            let inner = self.inner.lock();
            let now = self.clock.now();
            inner
                .records
                .iter()
                .map(|record| {
                    let in_state =
                        kiln_core::format_hms(now.duration_since(record.state_changed));
                    let deps = if record.dependencies.is_empty() {
                        "none".to_string()
                    } else {
                        record.dependencies.join(", ")
                    };
                    let threads = record
                        .threads
                        .and_then(|table| self.threads.totals(table))
                        .map(|t| {
                            format!(", {} threads, {} resident bytes", t.threads, t.resident_bytes)
                        })
                        .unwrap_or_default();
                    StatusLine {
                        priority: record.state.report_priority(),
                        text: format!(
                            "{}: {} for {in_state}, deps: {deps}{threads}",
                            record.name, record.state
                        ),
                    }
                })
                .collect()
        };

        for line in lines {
            self.narrate(line.priority, "%s", &[line.text.as_str().into()]);
        }
    }

    pub(crate) fn name_of(&self, id: SubsystemId) -> Result<String, RegistryError> {
        self.inner
            .lock()
            .records
            .get(id.0)
            .map(|r| r.name.clone())
            .ok_or(RegistryError::BadId(id.0))
    }

    /// External-wiring state update used by the boot and shutdown hooks;
    /// bypasses the start/stop legality checks but still timestamps and
    /// narrates.
    pub(crate) fn mark_state(&self, id: SubsystemId, state: SubsystemState) {
        let name = {
            let mut inner = self.inner.lock();
            let now = self.clock.now();
            let Some(record) = inner.records.get_mut(id.0) else {
                return;
            };
            if record.state == state {
                return;
            }
            record.set_state(state, now);
            record.name.clone()
        };
        self.narrate(
            LogPriority::Debug,
            "subsystem %s marked %s",
            &[name.as_str().into(), state.to_string().into()],
        );
    }

    pub(crate) fn each_id(&self) -> Vec<SubsystemId> {
        (0..self.count()).map(SubsystemId).collect()
    }

    /// Thread table and shutdown flag for the startup hook's liveness
    /// observation.
    pub(crate) fn hook_snapshot(
        &self,
        id: SubsystemId,
    ) -> Option<(Option<crate::threads::ThreadTableId>, Option<Arc<std::sync::atomic::AtomicBool>>)>
    {
        self.inner
            .lock()
            .records
            .get(id.0)
            .map(|r| (r.threads, r.shutdown_flag.clone()))
    }

    /// Name, formatted uptime, and thread count of every running
    /// subsystem, in registration order.
    pub(crate) fn running_entries(&self) -> Vec<(String, String, usize)> {
        let inner = self.inner.lock();
        let now = self.clock.now();
        inner
            .records
            .iter()
            .filter(|r| r.state == SubsystemState::Running)
            .map(|r| {
                let uptime = kiln_core::format_hms(now.duration_since(r.state_changed));
                let threads = r
                    .threads
                    .map(|table| self.threads.thread_count(table))
                    .unwrap_or(0);
                (r.name.clone(), uptime, threads)
            })
            .collect()
    }

    fn narrate(&self, priority: LogPriority, format: &str, args: &[LogValue]) {
        self.logger.log(Some(REGISTRY_SUBSYSTEM), Some(format), priority, args);
    }

    fn narrate_bad_id(&self, id: SubsystemId) {
        self.narrate(LogPriority::Error, "no subsystem with id %u", &[id.0.into()]);
    }
}

impl RegistryProbe for SubsystemRegistry {
    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn is_running_by_name(&self, name: &str) -> bool {
        SubsystemRegistry::is_running_by_name(self, name)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
