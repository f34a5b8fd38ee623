use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use saga_core::{ExecutionRequest, ExecutionResult, RegisteredSaga, RunStatus};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::compensation::compensate;
use crate::executor::concurrency::{ParallelismLimit, StepPermit};
use crate::executor::dispatcher::{DispatchError, DispatchMode, Dispatcher, StepOutput};
use crate::executor::events::{Event, EventEmitter, EventSink};
use crate::executor::result::{CompensationReport, RunReport};
use crate::executor::run::RunState;
use crate::executor::step_runner::{dispatch_step, RunContext};
use crate::executor::types::ExecutorConfig;

type StepTaskOutput = (String, Result<StepOutput, DispatchError>);

/// Drives a single run to completion with a fixed set of capabilities.
pub struct Executor {
    config: ExecutorConfig,
    dispatcher: Arc<dyn Dispatcher>,
    event_sink: Arc<dyn EventSink>,
}

impl Executor {
    pub fn new(
        config: ExecutorConfig,
        dispatcher: Arc<dyn Dispatcher>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            event_sink,
        }
    }

    /// Runs `registered` once. Never errors: every failure, including outer
    /// cancellation, is folded into a `failed` result after compensation.
    pub async fn execute_run(
        &self,
        run_id: Uuid,
        registered: &RegisteredSaga,
        request: &ExecutionRequest,
        outer: CancellationToken,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let saga = registered.saga.clone();
        let graph = registered.graph.clone();
        let trace_id: Arc<str> = if request.trace_id.is_empty() {
            Arc::from(run_id.to_string())
        } else {
            Arc::from(request.trace_id.as_str())
        };

        let ctx = RunContext {
            run_id,
            saga: saga.clone(),
            trace_id: trace_id.clone(),
            payload: Arc::new(request.payload.clone()),
            dispatcher: self.dispatcher.clone(),
            default_step_timeout: self.config.default_step_timeout,
        };
        let (emitter, forwarder) = EventEmitter::spawn(self.event_sink.clone(), self.config.event_timeout);
        let run_token = outer.child_token();
        let limit = ParallelismLimit::new(self.config.max_parallelism);

        let mut state = RunState::new(&saga, &graph);
        let mut ready: BTreeSet<String> = state.initially_ready();
        let mut in_flight: BTreeMap<String, StepPermit> = BTreeMap::new();
        let mut tasks: JoinSet<StepTaskOutput> = JoinSet::new();
        let mut halted = false;

        emitter.emit(Event::SagaStarted {
            run_id,
            saga: saga.name.clone(),
            trace_id: trace_id.to_string(),
        });
        tracing::info!(%run_id, saga = %saga.name, trace_id = %trace_id, steps = saga.steps.len(), "saga started");

        if outer.is_cancelled() {
            halted = true;
            state.cancelled = true;
        }

        loop {
            if !halted {
                while !ready.is_empty() {
                    let Some(permit) = limit.try_acquire() else {
                        break;
                    };
                    let Some(name) = ready.pop_first() else {
                        break;
                    };
                    let Some(step) = saga.step(&name).cloned() else {
                        continue;
                    };

                    state.mark_running(&name);
                    emitter.emit(Event::StepStarted {
                        run_id,
                        saga: saga.name.clone(),
                        trace_id: trace_id.to_string(),
                        step: name.clone(),
                    });
                    tracing::debug!(%run_id, step = %name, action = %step.action, "dispatching step");

                    in_flight.insert(name, permit);
                    let ctx = ctx.clone();
                    let cancel = run_token.clone();
                    tasks.spawn(async move {
                        let outcome = dispatch_step(&ctx, &step, DispatchMode::Forward, cancel).await;
                        (step.name, outcome)
                    });
                }
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((name, outcome))) => {
                        in_flight.remove(&name);
                        match outcome {
                            Ok(output) => {
                                state.record_success(&name, output);
                                emitter.emit(Event::StepSucceeded {
                                    run_id,
                                    saga: saga.name.clone(),
                                    trace_id: trace_id.to_string(),
                                    step: name.clone(),
                                });
                                tracing::debug!(%run_id, step = %name, "step succeeded");
                                if !halted {
                                    ready.extend(state.release_dependents(&name, &graph));
                                }
                            }
                            Err(e) => {
                                let error = e.to_string();
                                tracing::warn!(%run_id, step = %name, error = %error, "step failed");
                                state.record_failure(&name, error.clone());
                                emitter.emit(Event::StepFailed {
                                    run_id,
                                    saga: saga.name.clone(),
                                    trace_id: trace_id.to_string(),
                                    step: name,
                                    error,
                                });
                                if !halted {
                                    halted = true;
                                    run_token.cancel();
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(%run_id, error = %e, "step task ended abnormally");
                        halted = true;
                        run_token.cancel();
                    }
                    None => break,
                },
                _ = outer.cancelled(), if !halted => {
                    tracing::info!(%run_id, "run cancelled by caller");
                    halted = true;
                    state.cancelled = true;
                    run_token.cancel();
                }
            }
        }

        // Tasks that never reported back (aborted or panicked outside the
        // dispatcher call) still hold their slot here.
        for name in in_flight.into_keys() {
            state.record_failure(&name, "step task ended without reporting an outcome".into());
        }
        for name in state.running() {
            state.record_failure(&name, "step did not settle".into());
        }

        let succeeded = state.all_succeeded() && !state.cancelled;
        let failed_steps = state.failed().to_vec();
        let failed_step = failed_steps.first().cloned();

        let compensation = if succeeded {
            CompensationReport::default()
        } else {
            compensate(&ctx, &mut state, &emitter).await
        };

        let status = if succeeded {
            emitter.emit(Event::SagaCompleted {
                run_id,
                saga: saga.name.clone(),
                trace_id: trace_id.to_string(),
            });
            tracing::info!(%run_id, saga = %saga.name, "saga completed");
            RunStatus::Succeeded
        } else {
            let error = match &failed_step {
                Some(step) => format!(
                    "step {step:?} failed: {}",
                    state.error(step).unwrap_or("unknown error")
                ),
                None => "run cancelled".to_string(),
            };
            tracing::info!(
                %run_id,
                saga = %saga.name,
                failed_step = failed_step.as_deref().unwrap_or(""),
                compensated = compensation.compensated.len(),
                compensation_failures = compensation.failed.len(),
                "saga failed"
            );
            emitter.emit(Event::SagaFailed {
                run_id,
                saga: saga.name.clone(),
                trace_id: trace_id.to_string(),
                failed_step: failed_step.clone(),
                error,
            });
            RunStatus::Failed
        };

        drop(emitter);
        if !forwarder.flush(self.config.event_flush_timeout).await {
            tracing::warn!(%run_id, "event sink did not drain before the flush timeout");
        }

        let report = RunReport {
            run_id,
            trace_id: trace_id.to_string(),
            saga: saga.name.clone(),
            steps: state.step_reports(),
            failed_step,
            failed_steps,
            compensation,
            cancelled: state.cancelled,
        };

        ExecutionResult {
            started_at,
            finished_at: Utc::now(),
            status,
            details: report.to_details(),
        }
    }
}
