use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use saga_core::{Payload, Step};
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type StepOutput = serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Forward,
    Compensate,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Forward => "forward",
            DispatchMode::Compensate => "compensate",
        }
    }
}

/// Everything a dispatcher needs to perform one side effect.
#[derive(Debug, Clone)]
pub struct StepInvocation<'a> {
    pub run_id: Uuid,
    pub saga: &'a str,
    pub trace_id: &'a str,
    pub step: &'a Step,
    pub mode: DispatchMode,
    /// `step.action` for forward calls, `step.compensating_action` for compensation.
    pub action: &'a str,
    pub payload: &'a Payload,
    pub deadline: Option<Instant>,
    /// Fires when the run is abandoned. Honoring it is optional.
    pub cancel: CancellationToken,
}

impl StepInvocation<'_> {
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatcher rejected step: {0}")]
    Rejected(String),
    #[error("{0}")]
    Failed(String),
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("cancelled")]
    Cancelled,
}

/// The single side-effecting boundary of the engine.
///
/// Called at most once per step per run for the forward action, and at most once
/// more for its compensation. Retries, if wanted, belong inside the implementation.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn execute(&self, invocation: StepInvocation<'_>) -> Result<StepOutput, DispatchError>;
}

/// Fails every call. Used until a real backend is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectingDispatcher;

#[async_trait]
impl Dispatcher for RejectingDispatcher {
    async fn execute(&self, invocation: StepInvocation<'_>) -> Result<StepOutput, DispatchError> {
        Err(DispatchError::Rejected(format!(
            "no dispatcher configured for saga {:?}",
            invocation.saga
        )))
    }
}

/// Succeeds every call, echoing what it was asked to do.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoDispatcher;

#[async_trait]
impl Dispatcher for EchoDispatcher {
    async fn execute(&self, invocation: StepInvocation<'_>) -> Result<StepOutput, DispatchError> {
        Ok(json!({
            "action": invocation.action,
            "mode": invocation.mode.as_str(),
            "payload": invocation.payload,
        }))
    }
}

type DispatchFn = dyn for<'a> Fn(StepInvocation<'a>) -> BoxFuture<'a, Result<StepOutput, DispatchError>>
    + Send
    + Sync;

/// Adapts a closure into a [`Dispatcher`].
///
/// ```ignore
/// let d = FnDispatcher::new(|inv| Box::pin(async move { Ok(json!({ "step": inv.step.name })) }));
/// ```
#[derive(Clone)]
pub struct FnDispatcher {
    f: Arc<DispatchFn>,
}

impl FnDispatcher {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(StepInvocation<'a>) -> BoxFuture<'a, Result<StepOutput, DispatchError>>
            + Send
            + Sync
            + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl std::fmt::Debug for FnDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDispatcher").finish_non_exhaustive()
    }
}

#[async_trait]
impl Dispatcher for FnDispatcher {
    async fn execute(&self, invocation: StepInvocation<'_>) -> Result<StepOutput, DispatchError> {
        (self.f)(invocation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation<'a>(step: &'a Step, payload: &'a Payload, mode: DispatchMode) -> StepInvocation<'a> {
        StepInvocation {
            run_id: Uuid::new_v4(),
            saga: "order",
            trace_id: "t-1",
            step,
            mode,
            action: match mode {
                DispatchMode::Forward => &step.action,
                DispatchMode::Compensate => step.compensating_action.as_deref().unwrap_or_default(),
            },
            payload,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn rejecting_dispatcher_fails_every_call() {
        let step = Step::new("charge", "payments.charge");
        let payload = Payload::new();
        let err = RejectingDispatcher
            .execute(invocation(&step, &payload, DispatchMode::Forward))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Rejected(msg) if msg.contains("order")));
    }

    #[tokio::test]
    async fn echo_dispatcher_selects_action_by_mode() {
        let step = Step::new("charge", "payments.charge").compensated_by("payments.refund");
        let mut payload = Payload::new();
        payload.insert("amount".into(), json!(42));

        let out = EchoDispatcher
            .execute(invocation(&step, &payload, DispatchMode::Compensate))
            .await
            .unwrap();
        assert_eq!(out["action"], "payments.refund");
        assert_eq!(out["mode"], "compensate");
        assert_eq!(out["payload"]["amount"], 42);
    }

    #[tokio::test]
    async fn fn_dispatcher_calls_closure() {
        let d = FnDispatcher::new(|inv| {
            Box::pin(async move { Ok(json!({ "step": inv.step.name.clone() })) })
        });
        let step = Step::new("charge", "payments.charge");
        let payload = Payload::new();
        let out = d
            .execute(invocation(&step, &payload, DispatchMode::Forward))
            .await
            .unwrap();
        assert_eq!(out["step"], "charge");
    }
}
