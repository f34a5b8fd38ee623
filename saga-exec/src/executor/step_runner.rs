use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use saga_core::{Payload, Saga, Step};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::dispatcher::{DispatchError, DispatchMode, Dispatcher, StepInvocation, StepOutput};

/// Everything a step task needs, cheap to clone into each spawned task.
#[derive(Clone)]
pub(crate) struct RunContext {
    pub run_id: Uuid,
    pub saga: Arc<Saga>,
    pub trace_id: Arc<str>,
    pub payload: Arc<Payload>,
    pub dispatcher: Arc<dyn Dispatcher>,
    pub default_step_timeout: Option<Duration>,
}

impl RunContext {
    pub fn step_timeout(&self, step: &Step) -> Option<Duration> {
        step.deadline().or(self.default_step_timeout)
    }
}

/// Performs one dispatcher call for `step` in `mode`.
///
/// The step's timeout bounds the whole call; on expiry the call is dropped and
/// `TimedOut` returned. A panicking dispatcher is reported as `Failed`.
pub(crate) async fn dispatch_step(
    ctx: &RunContext,
    step: &Step,
    mode: DispatchMode,
    cancel: CancellationToken,
) -> Result<StepOutput, DispatchError> {
    let action = match mode {
        DispatchMode::Forward => step.action.as_str(),
        DispatchMode::Compensate => match step.compensating_action.as_deref() {
            Some(a) => a,
            None => {
                return Err(DispatchError::Failed(format!(
                    "step {:?} has no compensating action",
                    step.name
                )))
            }
        },
    };

    let timeout = ctx.step_timeout(step);
    let invocation = StepInvocation {
        run_id: ctx.run_id,
        saga: &ctx.saga.name,
        trace_id: &ctx.trace_id,
        step,
        mode,
        action,
        payload: &ctx.payload,
        deadline: timeout.map(|t| Instant::now() + t),
        cancel,
    };

    let call = AssertUnwindSafe(ctx.dispatcher.execute(invocation)).catch_unwind();
    let outcome = match timeout {
        Some(t) => match tokio::time::timeout(t, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(DispatchError::TimedOut(t)),
        },
        None => call.await,
    };

    outcome.unwrap_or_else(|panic| {
        Err(DispatchError::Failed(format!(
            "dispatcher panicked: {}",
            panic_message(panic.as_ref())
        )))
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::dispatcher::FnDispatcher;
    use serde_json::json;

    fn ctx(dispatcher: FnDispatcher, default_step_timeout: Option<Duration>) -> RunContext {
        RunContext {
            run_id: Uuid::new_v4(),
            saga: Arc::new(Saga::new("order")),
            trace_id: Arc::from("t-1"),
            payload: Arc::new(Payload::new()),
            dispatcher: Arc::new(dispatcher),
            default_step_timeout,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out() {
        let d = FnDispatcher::new(|_inv| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!(null))
            })
        });
        let step = Step::new("charge", "payments.charge").with_timeout(Duration::from_millis(50));
        let err = dispatch_step(&ctx(d, None), &step, DispatchMode::Forward, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, DispatchError::TimedOut(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_applies_when_step_has_none() {
        let d = FnDispatcher::new(|_inv| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(json!(null))
            })
        });
        let step = Step::new("charge", "payments.charge");
        let err = dispatch_step(
            &ctx(d, Some(Duration::from_secs(1))),
            &step,
            DispatchMode::Forward,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, DispatchError::TimedOut(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn panic_becomes_failure() {
        let d = FnDispatcher::new(|inv| {
            Box::pin(async move {
                if inv.step.name == "charge" {
                    panic!("kaboom");
                }
                Ok(json!(null))
            })
        });
        let step = Step::new("charge", "payments.charge");
        let err = dispatch_step(&ctx(d, None), &step, DispatchMode::Forward, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Failed(ref m) if m.contains("kaboom")), "{err}");
    }

    #[tokio::test]
    async fn compensate_without_action_is_an_error() {
        let d = FnDispatcher::new(|_inv| Box::pin(async move { Ok(json!(null)) }));
        let step = Step::new("email", "notify.send");
        let err = dispatch_step(&ctx(d, None), &step, DispatchMode::Compensate, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Failed(_)));
    }
}
