// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_record_targets_every_destination() {
    let record = QueuedRecord::new(
        "WebServer",
        "listening on :8080",
        LogPriority::State,
        CounterGroups::split(42),
    );

    assert!(record.log_console);
    assert!(record.log_file);
    assert!(record.log_database);
    assert_eq!(record.counter().to_string(), "000 000 042");
}

#[test]
fn payload_round_trips() {
    let record = QueuedRecord::new(
        "PrintQueue",
        "job accepted",
        LogPriority::Debug,
        CounterGroups::split(1_002_003),
    );

    let bytes = record.to_bytes();
    let back = QueuedRecord::from_bytes(&bytes).unwrap();
    assert_eq!(back, record);
}

#[test]
fn payload_uses_contract_field_names() {
    let record =
        QueuedRecord::new("Logging", "up", LogPriority::State, CounterGroups::split(7));
    let json: serde_json::Value = serde_json::from_slice(&record.to_bytes()).unwrap();

    assert_eq!(json["subsystem"], "Logging");
    assert_eq!(json["details"], "up");
    assert_eq!(json["priority"], 3);
    assert_eq!(json["counter_low"], 7);
    assert_eq!(json["LogConsole"], true);
    assert_eq!(json["LogFile"], true);
    assert_eq!(json["LogDatabase"], true);
}

#[test]
fn malformed_payload_is_an_error() {
    assert!(QueuedRecord::from_bytes(b"not json").is_err());
    assert!(QueuedRecord::from_bytes(b"{}").is_err());
}
