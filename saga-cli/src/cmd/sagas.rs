use std::path::Path;

use serde::Serialize;

use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

use super::config::load_registry;

#[derive(Serialize)]
struct SagaInfo {
    name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
    step_count: usize,
    compensable_steps: usize,
    max_parallel: usize,
}

#[derive(Serialize)]
struct SagasResult {
    sagas: Vec<SagaInfo>,
}

pub async fn sagas_cmd(path: &Path, output: OutputArgs) -> i32 {
    let registry = match load_registry(path, &output) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let sagas = registry
        .sagas()
        .into_iter()
        .map(|r| SagaInfo {
            name: r.saga.name.clone(),
            description: r.saga.description.clone(),
            step_count: r.saga.steps.len(),
            compensable_steps: r
                .saga
                .steps
                .iter()
                .filter(|s| s.compensating_action.is_some())
                .count(),
            max_parallel: r.graph.width(),
        })
        .collect();
    let result = SagasResult { sagas };

    if output.format != OutputFormat::Json && !output.quiet {
        println!("Sagas in {}:", path.display());
        for s in &result.sagas {
            println!(
                "  - {} ({} steps, {} compensable)",
                s.name, s.step_count, s.compensable_steps
            );
            if !s.description.is_empty() {
                println!("    {}", s.description);
            }
        }
    } else {
        print_result(output.format, output.quiet, &result);
    }

    exit_codes::SUCCESS
}
