use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Lifecycle notifications for one run. Serialized with a dotted `type` tag.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "saga.started")]
    SagaStarted {
        run_id: Uuid,
        saga: String,
        trace_id: String,
    },
    #[serde(rename = "step.started")]
    StepStarted {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        step: String,
    },
    #[serde(rename = "step.succeeded")]
    StepSucceeded {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        step: String,
    },
    #[serde(rename = "step.failed")]
    StepFailed {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        step: String,
        error: String,
    },
    #[serde(rename = "compensation.started")]
    CompensationStarted {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        steps: Vec<String>,
    },
    #[serde(rename = "step.compensating")]
    StepCompensating {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        step: String,
    },
    #[serde(rename = "step.compensated")]
    StepCompensated {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        step: String,
    },
    #[serde(rename = "step.compensation_failed")]
    StepCompensationFailed {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        step: String,
        error: String,
    },
    #[serde(rename = "compensation.finished")]
    CompensationFinished {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        compensated: Vec<String>,
        skipped: Vec<String>,
        failed: Vec<String>,
    },
    #[serde(rename = "saga.completed")]
    SagaCompleted {
        run_id: Uuid,
        saga: String,
        trace_id: String,
    },
    #[serde(rename = "saga.failed")]
    SagaFailed {
        run_id: Uuid,
        saga: String,
        trace_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failed_step: Option<String>,
        error: String,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SagaStarted { .. } => "saga.started",
            Event::StepStarted { .. } => "step.started",
            Event::StepSucceeded { .. } => "step.succeeded",
            Event::StepFailed { .. } => "step.failed",
            Event::CompensationStarted { .. } => "compensation.started",
            Event::StepCompensating { .. } => "step.compensating",
            Event::StepCompensated { .. } => "step.compensated",
            Event::StepCompensationFailed { .. } => "step.compensation_failed",
            Event::CompensationFinished { .. } => "compensation.finished",
            Event::SagaCompleted { .. } => "saga.completed",
            Event::SagaFailed { .. } => "saga.failed",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            Event::SagaStarted { run_id, .. }
            | Event::StepStarted { run_id, .. }
            | Event::StepSucceeded { run_id, .. }
            | Event::StepFailed { run_id, .. }
            | Event::CompensationStarted { run_id, .. }
            | Event::StepCompensating { run_id, .. }
            | Event::StepCompensated { run_id, .. }
            | Event::StepCompensationFailed { run_id, .. }
            | Event::CompensationFinished { run_id, .. }
            | Event::SagaCompleted { run_id, .. }
            | Event::SagaFailed { run_id, .. } => *run_id,
        }
    }

    pub fn saga(&self) -> &str {
        match self {
            Event::SagaStarted { saga, .. }
            | Event::StepStarted { saga, .. }
            | Event::StepSucceeded { saga, .. }
            | Event::StepFailed { saga, .. }
            | Event::CompensationStarted { saga, .. }
            | Event::StepCompensating { saga, .. }
            | Event::StepCompensated { saga, .. }
            | Event::StepCompensationFailed { saga, .. }
            | Event::CompensationFinished { saga, .. }
            | Event::SagaCompleted { saga, .. }
            | Event::SagaFailed { saga, .. } => saga,
        }
    }

    /// The step this event is about, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Event::StepStarted { step, .. }
            | Event::StepSucceeded { step, .. }
            | Event::StepFailed { step, .. }
            | Event::StepCompensating { step, .. }
            | Event::StepCompensated { step, .. }
            | Event::StepCompensationFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}

/// Logs every event through `tracing`. Failures go out at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        let kind = event.kind();
        let run_id = event.run_id();
        match &event {
            Event::StepFailed { saga, step, error, .. }
            | Event::StepCompensationFailed { saga, step, error, .. } => {
                tracing::warn!(event = kind, %run_id, saga = %saga, step = %step, error = %error, "saga event");
            }
            Event::SagaFailed { saga, failed_step, error, .. } => {
                tracing::warn!(
                    event = kind,
                    %run_id,
                    saga = %saga,
                    failed_step = failed_step.as_deref().unwrap_or(""),
                    error = %error,
                    "saga event"
                );
            }
            _ => {
                tracing::info!(
                    event = kind,
                    %run_id,
                    saga = event.saga(),
                    step = event.step().unwrap_or(""),
                    "saga event"
                );
            }
        }
    }
}

/// Writes one JSON object per line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(line) => {
                let mut out = std::io::stdout().lock();
                if let Err(e) = writeln!(out, "{line}") {
                    tracing::warn!(error = %e, "failed to write event to stdout");
                }
            }
            Err(e) => tracing::warn!(error = %e, event = event.kind(), "failed to encode event"),
        }
    }
}

#[derive(Default, Clone)]
pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.add(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Run-side handle for publishing events. Never waits on the sink.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<Event>,
}

/// Drains an [`EventEmitter`]'s queue into a sink on its own task.
#[derive(Debug)]
pub struct EventForwarder {
    handle: JoinHandle<()>,
}

impl EventEmitter {
    /// Starts a forwarder task. Each delivery is bounded by `per_event_timeout`;
    /// a sink that panics or stalls only loses that one event.
    pub fn spawn(sink: Arc<dyn EventSink>, per_event_timeout: Duration) -> (Self, EventForwarder) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind();
                let delivery = AssertUnwindSafe(sink.emit(event)).catch_unwind();
                match tokio::time::timeout(per_event_timeout, delivery).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) => tracing::warn!(event = kind, "event sink panicked"),
                    Err(_) => tracing::warn!(
                        event = kind,
                        timeout_ms = per_event_timeout.as_millis() as u64,
                        "event sink timed out"
                    ),
                }
            }
        });
        (Self { tx }, EventForwarder { handle })
    }

    pub fn emit(&self, event: Event) {
        // The forwarder only stops once every emitter is gone.
        let _ = self.tx.send(event);
    }
}

impl EventForwarder {
    /// Waits for queued events to be delivered. Every emitter must be dropped
    /// first or this waits the full `timeout`. Returns `false` if the queue
    /// did not drain in time; the forwarder then keeps going in the background.
    pub async fn flush(mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, &mut self.handle).await.is_ok()
    }
}
