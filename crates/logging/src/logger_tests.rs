// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::buffer::LOG_BUFFER_SIZE;
use crate::guards::MutexOpGuard;
use crate::queue::LogQueue;
use serial_test::serial;
use std::collections::HashSet;
use std::time::Duration;

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

/// Probe standing in for the subsystem registry.
struct FakeProbe {
    empty: bool,
    logging_running: bool,
}

impl RegistryProbe for FakeProbe {
    fn is_empty(&self) -> bool {
        self.empty
    }

    fn is_running_by_name(&self, name: &str) -> bool {
        name == LOGGING_SUBSYSTEM && self.logging_running
    }
}

fn capture_logger(config: LoggingConfig) -> (Arc<Logger>, CaptureSink) {
    let sink = CaptureSink::default();
    let logger = Arc::new(Logger::new(config).with_console_sink(Box::new(sink.clone())));
    (logger, sink)
}

/// Flip a logger into normal (queue) dispatch mode.
fn enter_normal_mode(logger: &Arc<Logger>) -> Arc<LogQueue> {
    logger.mark_server_started();
    logger.set_registry_probe(Arc::new(FakeProbe { empty: false, logging_running: true }));
    logger.queues().find_or_register(SYSTEM_LOG_QUEUE)
}

#[test]
fn missing_subsystem_and_format_get_placeholders() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    logger.log(None, None, LogPriority::Error, &[]);

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Unknown"), "line: {}", lines[0]);
    assert!(lines[0].ends_with("No message"), "line: {}", lines[0]);
}

#[test]
fn startup_mode_filters_below_the_startup_level() {
    let mut config = LoggingConfig::default();
    config.startup_level = LogPriority::State;
    let (logger, sink) = capture_logger(config);

    for priority in [LogPriority::Trace, LogPriority::Debug, LogPriority::State, LogPriority::Error]
    {
        logger.log(Some("Boot"), Some(priority.label()), priority, &[]);
    }

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("STATE"));
    assert!(lines[1].ends_with("ERROR"));
    // The rolling buffer saw exactly the same two records.
    assert_eq!(logger.buffer().len(), 2);
}

#[test]
fn empty_registry_keeps_startup_mode_even_when_marked_running() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    logger.mark_server_started();
    logger.set_registry_probe(Arc::new(FakeProbe { empty: true, logging_running: false }));
    logger.queues().find_or_register(SYSTEM_LOG_QUEUE);

    logger.log(Some("Boot"), Some("early"), LogPriority::State, &[]);

    // Synchronous console write, not an enqueue.
    assert_eq!(sink.lines().len(), 1);
}

#[test]
fn normal_mode_enqueues_instead_of_writing_console() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    let queue = enter_normal_mode(&logger);

    logger.log(Some("WebServer"), Some("request served"), LogPriority::Debug, &[]);

    assert_eq!(queue.len(), 1);
    assert!(sink.lines().is_empty());
    assert!(logger.buffer().is_empty());

    let record = QueuedRecord::from_bytes(&queue.dequeue().unwrap().payload).unwrap();
    assert_eq!(record.subsystem, "WebServer");
    assert_eq!(record.details, "request served");
    assert!(record.log_console && record.log_file && record.log_database);
}

#[test]
fn full_queue_falls_back_to_console() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    logger.mark_server_started();
    logger.set_registry_probe(Arc::new(FakeProbe { empty: false, logging_running: true }));
    logger.queues().register(Arc::new(LogQueue::new(SYSTEM_LOG_QUEUE, 1)));

    logger.log(Some("WebServer"), Some("first"), LogPriority::Debug, &[]);
    logger.log(Some("WebServer"), Some("second"), LogPriority::Debug, &[]);

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("second"));
}

#[test]
fn missing_queue_falls_back_to_console_only_when_enabled() {
    let mut config = LoggingConfig::default();
    config.console.enabled = false;
    let (logger, sink) = capture_logger(config);
    logger.mark_server_started();
    logger.set_registry_probe(Arc::new(FakeProbe { empty: false, logging_running: true }));

    logger.log(Some("WebServer"), Some("dropped"), LogPriority::Debug, &[]);
    assert!(sink.lines().is_empty());
}

#[test]
fn shutdown_mode_writes_synchronously_past_the_queue() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    let queue = enter_normal_mode(&logger);
    logger.begin_queue_shutdown();

    logger.log(Some("Shutdown"), Some("closing"), LogPriority::Alert, &[]);

    assert!(queue.is_empty());
    assert_eq!(sink.lines().len(), 1);
}

#[test]
fn shutdown_complete_message_bypasses_the_queue() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    let queue = enter_normal_mode(&logger);

    logger.log(Some("Shutdown"), Some("Shutdown complete"), LogPriority::State, &[]);

    assert!(queue.is_empty());
    assert_eq!(sink.lines().len(), 1);
}

#[test]
fn recursion_guard_drops_the_record() {
    let (logger, sink) = capture_logger(LoggingConfig::default());

    let _mutex_op = MutexOpGuard::enter();
    logger.log(Some("Deadlock"), Some("never printed"), LogPriority::Fatal, &[]);

    assert!(sink.lines().is_empty());
    assert!(logger.buffer().is_empty());
}

#[test]
fn specifier_mismatch_still_emits_the_record() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    logger.log(Some("WebServer"), Some("got %d and %d"), LogPriority::Error, &[1.into()]);

    let lines = sink.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("got 1 and %d"), "line: {}", lines[0]);
}

#[test]
fn every_record_reaches_the_oob_sink_regardless_of_filtering() {
    struct CountingSink(Arc<Mutex<Vec<(String, LogPriority)>>>);

    impl OobSink for CountingSink {
        fn is_enabled(&self) -> bool {
            true
        }

        fn send(&self, subsystem: &str, _details: &str, priority: LogPriority) {
            self.0.lock().push((subsystem.to_string(), priority));
        }
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut config = LoggingConfig::default();
    config.startup_level = LogPriority::Quiet;
    let logger = Logger::new(config)
        .with_console_sink(Box::new(CaptureSink::default()))
        .with_oob_sink(Box::new(CountingSink(Arc::clone(&seen))));

    // Trace is filtered from every destination, but the sink still sees it.
    logger.log(Some("mDNSServer"), Some("probe"), LogPriority::Trace, &[]);

    let seen = seen.lock();
    assert_eq!(seen.as_slice(), &[("mDNSServer".to_string(), LogPriority::Trace)]);
}

#[test]
fn counters_are_unique_across_threads() {
    let (logger, _sink) = capture_logger(LoggingConfig::default());

    let mut handles = Vec::new();
    for t in 0..4 {
        let logger = Arc::clone(&logger);
        handles.push(std::thread::spawn(move || {
            for i in 0..100 {
                let message = format!("t{t} m{i}");
                logger.log(Some("Load"), Some(message.as_str()), LogPriority::Debug, &[]);
            }
        }));
    }
    for handle in handles {
        let _ = handle.join();
    }

    let lines = logger.buffer().query_last(LOG_BUFFER_SIZE);
    assert_eq!(lines.len(), 400);
    let counters: HashSet<String> = lines.iter().map(|l| l[..15].to_string()).collect();
    assert_eq!(counters.len(), 400, "counter collision across threads");
}

#[test]
fn group_holder_excludes_other_threads_until_release() {
    let (logger, sink) = capture_logger(LoggingConfig::default());

    let group = logger.group_begin();
    logger.log(Some("Boot"), Some("group line one"), LogPriority::State, &[]);
    logger.log(Some("Boot"), Some("group line two"), LogPriority::State, &[]);

    let other = {
        let logger = Arc::clone(&logger);
        std::thread::spawn(move || {
            logger.log(Some("Other"), Some("outside the group"), LogPriority::State, &[]);
        })
    };

    // The other thread is parked on the group condvar.
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(sink.lines().len(), 2, "non-holder must not interleave");

    drop(group);
    other.join().ok();

    let lines = sink.lines();
    assert_eq!(lines.len(), 3);
    assert!(lines[2].ends_with("outside the group"));
}

#[test]
fn sequential_groups_on_one_thread_never_deadlock() {
    let (logger, sink) = capture_logger(LoggingConfig::default());

    let first = logger.group_begin();
    logger.log(Some("Boot"), Some("first bracket"), LogPriority::State, &[]);
    drop(first);

    let second = logger.group_begin();
    logger.log(Some("Boot"), Some("second bracket"), LogPriority::State, &[]);
    drop(second);

    assert_eq!(sink.lines().len(), 2);
}

#[test]
#[serial]
fn global_accessor_routes_and_uninstall_silences() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    crate::install(Arc::clone(&logger));

    crate::log("WebServer", LogPriority::State, "via global", &[]);
    assert_eq!(sink.lines().len(), 1);

    crate::uninstall();
    crate::log("WebServer", LogPriority::State, "after uninstall", &[]);
    assert_eq!(sink.lines().len(), 1);
}

#[test]
#[serial]
fn log_this_macro_converts_arguments() {
    let (logger, sink) = capture_logger(LoggingConfig::default());
    crate::install(Arc::clone(&logger));

    crate::log_this!("PrintQueue", LogPriority::State, "job %d from %s", 7, "alice");

    let lines = sink.lines();
    assert!(lines[0].ends_with("job 7 from alice"), "line: {}", lines[0]);
    crate::uninstall();
}
