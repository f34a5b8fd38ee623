use std::path::Path;

use saga_core::{ExecutionRequest, ExecutionResult};
use saga_exec::{ExecutionError, RunReport};
use tokio_util::sync::CancellationToken;

use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{DispatcherArgs, EngineArgs, EventsArgs, OutputArgs};

use super::config::{build_coordinator, load_payload, load_registry, merge_set_payload};

#[allow(clippy::too_many_arguments)]
pub async fn execute_cmd(
    path: &Path,
    saga_name: &str,
    payload_path: Option<&Path>,
    set_payload: &[String],
    trace_id: Option<&str>,
    output: OutputArgs,
    engine: EngineArgs,
    dispatcher: DispatcherArgs,
    events: EventsArgs,
) -> i32 {
    let registry = match load_registry(path, &output) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let mut payload = match load_payload(payload_path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    if let Err(e) = merge_set_payload(&mut payload, set_payload) {
        print_error(output.format, output.quiet, &e);
        return exit_codes::VALIDATION_FAILED;
    }

    let coordinator = match build_coordinator(registry, &engine, &dispatcher, &events) {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &e);
            return exit_codes::RUNTIME_ERROR;
        }
    };

    let mut request = ExecutionRequest::new(saga_name).with_payload(payload);
    if let Some(t) = trace_id {
        request = request.with_trace_id(t);
    }

    // Ctrl-C stops dispatching and unwinds what already ran.
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let outcome = coordinator.execute_with_cancel(request, cancel).await;
    interrupt.abort();

    match outcome {
        Ok(result) => {
            if output.format == OutputFormat::Json || output.quiet {
                print_result(output.format, output.quiet, &result);
            } else {
                print_text(&result);
            }
            if result.succeeded() {
                exit_codes::SUCCESS
            } else {
                exit_codes::RUN_FAILED
            }
        }
        Err(ExecutionError::NotFound(e)) => {
            print_error(output.format, output.quiet, &e.to_string());
            exit_codes::RUNTIME_ERROR
        }
    }
}

fn print_text(result: &ExecutionResult) {
    let report = match RunReport::from_details(&result.details) {
        Ok(r) => r,
        Err(_) => {
            print_result(OutputFormat::Text, false, result);
            return;
        }
    };

    println!(
        "run {} ({}): {} in {}ms",
        report.run_id,
        report.saga,
        result.status,
        result.duration().num_milliseconds()
    );
    for (name, step) in &report.steps {
        match (&step.error, &step.compensation_error) {
            (Some(err), _) => println!("  {name:<24} {:<20} {err}", step.status.as_str()),
            (None, Some(err)) => println!("  {name:<24} {:<20} {err}", step.status.as_str()),
            (None, None) => println!("  {name:<24} {}", step.status.as_str()),
        }
    }
    if let Some(failed) = &report.failed_step {
        println!("failed step: {failed}");
    }
    if report.cancelled {
        println!("run was cancelled");
    }
    if !report.compensation.is_empty() {
        println!("compensation order: {}", report.compensation.order.join(" -> "));
    }
}
