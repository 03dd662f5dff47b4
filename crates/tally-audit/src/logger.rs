use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tally_types::{Actor, Clock};
use tokio::sync::broadcast;
use tracing::error;

use crate::event::{AuditAction, AuditEvent};
use crate::sink::AuditSink;

/// Default capacity of the failure broadcast channel.
const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// A sink write that did not succeed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditFailure {
    pub sink: String,
    pub action: AuditAction,
    pub error: String,
    pub at: DateTime<Utc>,
}

/// Fans audit events out to every configured sink.
///
/// Recording never returns an error. A failing sink is reported through
/// `tracing::error!`, the failure counter, and the failure channel, and the
/// remaining sinks still receive the event.
pub struct AuditLogger {
    sinks: Vec<Arc<dyn AuditSink>>,
    clock: Arc<dyn Clock>,
    failures: AtomicU64,
    failure_tx: broadcast::Sender<AuditFailure>,
}

impl AuditLogger {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (failure_tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self {
            sinks: Vec::new(),
            clock,
            failures: AtomicU64::new(0),
            failure_tx,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Receive every future sink failure.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<AuditFailure> {
        self.failure_tx.subscribe()
    }

    /// Sink failures since construction.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Start an event stamped with the current time.
    pub fn event(&self, action: AuditAction, actor: &Actor) -> AuditEvent {
        AuditEvent::new(action, actor.clone(), self.clock.now())
    }

    /// Record an action with its before/after snapshots and outcome.
    pub fn record(
        &self,
        action: AuditAction,
        actor: &Actor,
        old: Option<Value>,
        new: Option<Value>,
        result: Result<(), String>,
    ) {
        let mut event = self.event(action, actor);
        event.old_value = old;
        event.new_value = new;
        if let Err(message) = result {
            event = event.failed(message);
        }
        self.emit(&event);
    }

    /// Run `op` and record its outcome. `snapshot` renders the success
    /// value as the event's new value. The result of `op` is returned as is.
    pub fn audited<T, E, F, G>(&self, template: AuditEvent, op: F, snapshot: G) -> Result<T, E>
    where
        E: Display,
        F: FnOnce() -> Result<T, E>,
        G: FnOnce(&T) -> Option<Value>,
    {
        let result = op();
        let mut event = template;
        match &result {
            Ok(value) => event.new_value = snapshot(value).or(event.new_value),
            Err(err) => event = event.failed(err.to_string()),
        }
        self.emit(&event);
        result
    }

    /// Write a prepared event to every sink.
    pub fn emit(&self, event: &AuditEvent) {
        for sink in &self.sinks {
            if let Err(err) = sink.write(event) {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    sink = sink.name(),
                    action = %event.action,
                    error = %err,
                    "audit write failed"
                );
                // No subscribers is not an error.
                let _ = self.failure_tx.send(AuditFailure {
                    sink: sink.name().to_string(),
                    action: event.action,
                    error: err.to_string(),
                    at: event.at,
                });
            }
        }
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger")
            .field("sinks", &self.sinks.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("failures", &self.failure_count())
            .finish()
    }
}
