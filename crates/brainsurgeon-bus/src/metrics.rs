// SPDX-FileCopyrightText: 2026 BrainSurgeon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dispatch metrics through the `metrics` facade.
//!
//! Nothing is exported unless the binary installs a recorder.

use brainsurgeon_core::MessageType;
use metrics::{describe_counter, describe_gauge, describe_histogram};

pub const MESSAGES_PROCESSED: &str = "brainsurgeon_bus_messages_processed_total";
pub const HANDLER_FAILURES: &str = "brainsurgeon_bus_handler_failures_total";
pub const MESSAGES_DEFERRED: &str = "brainsurgeon_bus_messages_deferred_total";
pub const MESSAGES_PUBLISHED: &str = "brainsurgeon_bus_messages_published_total";
pub const DISPATCH_LATENCY: &str = "brainsurgeon_bus_dispatch_latency_seconds";
pub const BACKLOG: &str = "brainsurgeon_bus_backlog";

/// Why a handler invocation did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Error,
    Timeout,
    Panic,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Panic => "panic",
        }
    }
}

/// Register metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!(MESSAGES_PROCESSED, "Messages marked processed by the dispatcher");
    describe_counter!(HANDLER_FAILURES, "Handler invocations that failed, timed out or panicked");
    describe_counter!(MESSAGES_DEFERRED, "Unprocessed messages skipped for lack of subscribers");
    describe_counter!(MESSAGES_PUBLISHED, "Messages appended by this process");
    describe_histogram!(DISPATCH_LATENCY, "Time spent running all handlers for one message");
    describe_gauge!(BACKLOG, "Unprocessed messages seen at the start of the last pass");
}

pub fn record_published(kind: MessageType) {
    metrics::counter!(MESSAGES_PUBLISHED, "type" => kind.to_string()).increment(1);
}

pub fn record_processed(kind: MessageType) {
    metrics::counter!(MESSAGES_PROCESSED, "type" => kind.to_string()).increment(1);
}

pub fn record_deferred(kind: MessageType) {
    metrics::counter!(MESSAGES_DEFERRED, "type" => kind.to_string()).increment(1);
}

pub fn record_handler_failure(kind: MessageType, handler: &str, reason: FailureReason) {
    metrics::counter!(
        HANDLER_FAILURES,
        "type" => kind.to_string(),
        "handler" => handler.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
}

pub fn record_dispatch_latency(kind: MessageType, seconds: f64) {
    metrics::histogram!(DISPATCH_LATENCY, "type" => kind.to_string()).record(seconds);
}

pub fn set_backlog(count: usize) {
    metrics::gauge!(BACKLOG).set(count as f64);
}
