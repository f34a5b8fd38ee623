use saga_core::StepStatus;
use tokio_util::sync::CancellationToken;

use crate::executor::dispatcher::DispatchMode;
use crate::executor::events::{Event, EventEmitter};
use crate::executor::result::CompensationReport;
use crate::executor::run::RunState;
use crate::executor::step_runner::{dispatch_step, RunContext};

/// Unwinds every forward-succeeded step, most recently completed first.
///
/// Best effort: a failed compensation is recorded and the walk continues.
/// Calls run one at a time under a fresh token so the cancellation that
/// stopped the forward pass does not also stop the unwinding.
pub(crate) async fn compensate(
    ctx: &RunContext,
    state: &mut RunState,
    emitter: &EventEmitter,
) -> CompensationReport {
    let order = state.succeeded_in_reverse_completion();
    let mut report = CompensationReport {
        order: order.clone(),
        ..Default::default()
    };

    emitter.emit(Event::CompensationStarted {
        run_id: ctx.run_id,
        saga: ctx.saga.name.clone(),
        trace_id: ctx.trace_id.to_string(),
        steps: order.clone(),
    });
    tracing::info!(run_id = %ctx.run_id, saga = %ctx.saga.name, steps = order.len(), "compensating");

    let token = CancellationToken::new();
    for name in &order {
        let Some(step) = ctx.saga.step(name) else {
            continue;
        };
        if step.compensating_action.is_none() {
            state.set_status(name, StepStatus::Skipped);
            report.skipped.push(name.clone());
            continue;
        }

        state.set_status(name, StepStatus::Compensating);
        emitter.emit(Event::StepCompensating {
            run_id: ctx.run_id,
            saga: ctx.saga.name.clone(),
            trace_id: ctx.trace_id.to_string(),
            step: name.clone(),
        });

        match dispatch_step(ctx, step, DispatchMode::Compensate, token.child_token()).await {
            Ok(_) => {
                state.set_status(name, StepStatus::Compensated);
                report.compensated.push(name.clone());
                emitter.emit(Event::StepCompensated {
                    run_id: ctx.run_id,
                    saga: ctx.saga.name.clone(),
                    trace_id: ctx.trace_id.to_string(),
                    step: name.clone(),
                });
            }
            Err(e) => {
                let error = e.to_string();
                tracing::warn!(run_id = %ctx.run_id, step = %name, error = %error, "compensation failed");
                state.record_compensation_error(name, error.clone());
                report.failed.insert(name.clone(), error.clone());
                emitter.emit(Event::StepCompensationFailed {
                    run_id: ctx.run_id,
                    saga: ctx.saga.name.clone(),
                    trace_id: ctx.trace_id.to_string(),
                    step: name.clone(),
                    error,
                });
            }
        }
    }

    emitter.emit(Event::CompensationFinished {
        run_id: ctx.run_id,
        saga: ctx.saga.name.clone(),
        trace_id: ctx.trace_id.to_string(),
        compensated: report.compensated.clone(),
        skipped: report.skipped.clone(),
        failed: report.failed.keys().cloned().collect(),
    });
    report
}
