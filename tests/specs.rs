//! End-to-end runtime core specs.
//!
//! Each test wires the full stack the way the server boot script does:
//! one logger, one thread registry, one subsystem registry installed as
//! the logger's probe, and (where the scenario needs it) the queue
//! consumer.

use kiln_core::{LogPriority, LoggingConfig};
use kiln_logging::{
    ConsumerHandle, LogQueue, Logger, NullDatabaseSink, LOG_BUFFER_SIZE, SYSTEM_LOG_QUEUE,
};
use kiln_registry::{SubsystemHooks, SubsystemRegistry, SubsystemState, ThreadRegistry};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Console sink that captures bytes for assertions.
#[derive(Clone, Default)]
struct CaptureSink(Arc<Mutex<Vec<u8>>>);

impl CaptureSink {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(|l| l.to_string())
            .collect()
    }
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct Harness {
    logger: Arc<Logger>,
    sink: CaptureSink,
    registry: Arc<SubsystemRegistry>,
}

impl Harness {
    fn boot(config: LoggingConfig) -> Self {
        let sink = CaptureSink::default();
        let logger = Arc::new(
            Logger::new(config).with_console_sink(Box::new(sink.clone())),
        );
        let threads = Arc::new(ThreadRegistry::new(Arc::clone(&logger)));
        let registry = Arc::new(SubsystemRegistry::new(Arc::clone(&logger), threads));
        logger.set_registry_probe(Arc::clone(&registry) as Arc<dyn kiln_logging::RegistryProbe>);
        Self { logger, sink, registry }
    }

    /// Register Logging plus a WebServer that depends on it.
    fn register_pair(&self) -> (kiln_registry::SubsystemId, kiln_registry::SubsystemId) {
        let logging = self.registry.register("Logging", SubsystemHooks::new()).unwrap();
        let web = self.registry.register("WebServer", SubsystemHooks::new()).unwrap();
        self.registry.add_dependency(web, "Logging").unwrap();
        (logging, web)
    }
}

#[test]
fn clean_boot_starts_and_stops_in_dependency_order() {
    let harness = Harness::boot(LoggingConfig::default());
    let (logging, web) = harness.register_pair();

    harness.registry.start(logging).unwrap();
    harness.registry.start(web).unwrap();
    assert_eq!(harness.registry.state(logging), Some(SubsystemState::Running));
    assert_eq!(harness.registry.state(web), Some(SubsystemState::Running));

    harness.registry.status_report();
    let narration = harness.logger.buffer().query_by_subsystem("Registry");
    assert!(narration.contains("Logging: Running"), "got: {narration}");
    assert!(narration.contains("WebServer: Running"), "got: {narration}");

    harness.registry.stop(web).unwrap();
    harness.registry.stop(logging).unwrap();
    assert_eq!(harness.registry.state(logging), Some(SubsystemState::Inactive));
    assert_eq!(harness.registry.state(web), Some(SubsystemState::Inactive));
}

#[test]
fn stopping_a_dependency_first_is_blocked_and_named() {
    let harness = Harness::boot(LoggingConfig::default());
    let (logging, web) = harness.register_pair();
    harness.registry.start(logging).unwrap();
    harness.registry.start(web).unwrap();

    assert!(harness.registry.stop(logging).is_err());
    assert_eq!(harness.registry.state(logging), Some(SubsystemState::Running));

    let narration = harness.logger.buffer().query_by_subsystem("Registry");
    assert!(narration.contains("WebServer"), "blocked-stop log must name the dependent");
}

#[test]
fn starting_with_a_missing_dependency_fails_and_names_it() {
    let harness = Harness::boot(LoggingConfig::default());
    let web = harness.registry.register("WebServer", SubsystemHooks::new()).unwrap();
    harness.registry.add_dependency(web, "Logging").unwrap();

    assert!(harness.registry.start(web).is_err());
    assert_eq!(harness.registry.state(web), Some(SubsystemState::Inactive));

    let narration = harness.logger.buffer().query_by_subsystem("Registry");
    assert!(narration.contains("Logging"), "missing-dependency log must name it");
}

#[test]
fn duplicate_registration_is_rejected() {
    let harness = Harness::boot(LoggingConfig::default());

    harness.registry.register("Logging", SubsystemHooks::new()).unwrap();
    assert!(harness.registry.register("Logging", SubsystemHooks::new()).is_err());
    assert_eq!(harness.registry.count(), 1);

    let narration = harness.logger.buffer().query_by_subsystem("Registry");
    assert!(narration.contains("already registered"), "got: {narration}");
}

#[test]
fn counters_are_contiguous_and_per_thread_monotonic() {
    const PER_THREAD: u64 = 10_000;

    let harness = Harness::boot(LoggingConfig::default());
    let logging = harness.registry.register("Logging", SubsystemHooks::new()).unwrap();
    harness.registry.start(logging).unwrap();
    harness.logger.mark_server_started();
    harness
        .logger
        .queues()
        .register(Arc::new(LogQueue::new(SYSTEM_LOG_QUEUE, 2 * PER_THREAD as usize + 16)));

    let queue = harness.logger.queues().find(SYSTEM_LOG_QUEUE).unwrap();

    let workers: Vec<_> = (0..2)
        .map(|t| {
            let logger = Arc::clone(&harness.logger);
            std::thread::spawn(move || {
                let subsystem = format!("T{t}");
                for i in 0..PER_THREAD {
                    logger.log(
                        Some(subsystem.as_str()),
                        Some("record %u"),
                        LogPriority::Debug,
                        &[i.into()],
                    );
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let mut all = Vec::new();
    let mut per_thread: [Vec<u64>; 2] = [Vec::new(), Vec::new()];
    while let Some(entry) = queue.dequeue() {
        let record = kiln_core::QueuedRecord::from_bytes(&entry.payload).unwrap();
        let counter = record.counter_super as u64 * 1_000_000
            + record.counter_high as u64 * 1_000
            + record.counter_low as u64;
        all.push(counter);
        match record.subsystem.as_str() {
            "T0" => per_thread[0].push(counter),
            "T1" => per_thread[1].push(counter),
            other => panic!("unexpected subsystem {other}"),
        }
    }

    assert_eq!(all.len(), 2 * PER_THREAD as usize);
    let start = *all.iter().min().unwrap();
    let mut sorted = all.clone();
    sorted.sort_unstable();
    let expected: Vec<u64> = (start..start + 2 * PER_THREAD).collect();
    assert_eq!(sorted, expected, "counters must form a contiguous range");

    for counters in &per_thread {
        assert_eq!(counters.len(), PER_THREAD as usize);
        assert!(counters.windows(2).all(|w| w[0] < w[1]), "per-thread order must be monotonic");
    }
}

#[test]
fn startup_mode_filters_console_and_buffer_below_the_startup_level() {
    let mut config = LoggingConfig::default();
    config.startup_level = LogPriority::State;
    let harness = Harness::boot(config);

    for priority in [LogPriority::Trace, LogPriority::Debug, LogPriority::State, LogPriority::Error]
    {
        harness.logger.log(Some("Boot"), Some(priority.label()), priority, &[]);
    }

    let lines = harness.sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("STATE"));
    assert!(lines[1].ends_with("ERROR"));

    let buffered = harness.logger.buffer().query_last(LOG_BUFFER_SIZE);
    assert_eq!(buffered.len(), 2);
    assert!(buffered[0].ends_with("ERROR"));
    assert!(buffered[1].ends_with("STATE"));
}

#[test]
fn shutdown_drains_every_queued_record_into_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("kiln.log");

    let mut config = LoggingConfig::default();
    config.console.enabled = false;
    config.file.enabled = true;
    config.file.default_level = LogPriority::Trace;
    config.file_path = Some(log_path.clone());

    let harness = Harness::boot(config);
    let logging = harness.registry.register("Logging", SubsystemHooks::new()).unwrap();
    harness.registry.start(logging).unwrap();
    harness.logger.mark_server_started();

    let consumer =
        ConsumerHandle::spawn(Arc::clone(&harness.logger), Arc::new(NullDatabaseSink)).unwrap();

    for i in 0..100 {
        harness.logger.log(Some("PrintQueue"), Some("record %u"), LogPriority::State, &[(i as u64).into()]);
    }
    consumer.shutdown();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 100, "every queued record must be drained");
    assert!(lines[99].ends_with("record 99"));
}

#[test]
fn a_mutex_marked_code_path_cannot_log() {
    let harness = Harness::boot(LoggingConfig::default());

    {
        let _mutex_op = kiln_logging::guards::MutexOpGuard::enter();
        harness.logger.log(Some("Deadlock"), Some("dropped"), LogPriority::Fatal, &[]);
    }

    assert!(harness.sink.lines().is_empty());
    assert!(harness.logger.buffer().is_empty());

    // The guard is scoped: logging works again afterward.
    harness.logger.log(Some("Deadlock"), Some("recovered"), LogPriority::Fatal, &[]);
    assert_eq!(harness.sink.lines().len(), 1);
}
