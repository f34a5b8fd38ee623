use std::path::Path;

use saga_core::types::format_duration;
use saga_core::RegisteredSaga;
use serde::Serialize;

use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::OutputArgs;

use super::config::load_registry;

#[derive(Serialize)]
struct PlannedStep {
    name: String,
    action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    compensating_action: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    requires: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<String>,
    level: usize,
}

#[derive(Serialize)]
struct PlanResult {
    saga: String,
    topo_order: Vec<String>,
    levels: Vec<Vec<String>>,
    steps: Vec<PlannedStep>,
}

pub async fn plan_cmd(path: &Path, saga_name: &str, output: OutputArgs) -> i32 {
    let registry = match load_registry(path, &output) {
        Ok(r) => r,
        Err(code) => return code,
    };
    let registered = match registry.lookup(saga_name) {
        Ok(r) => r,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::RUNTIME_ERROR;
        }
    };

    match output.format {
        OutputFormat::Dot => {
            if !output.quiet {
                print!("{}", registered.graph.to_dot(&registered.saga.name));
            }
        }
        OutputFormat::Json => print_result(output.format, output.quiet, &plan_result(&registered)),
        OutputFormat::Text => {
            if !output.quiet {
                print_text(&plan_result(&registered));
            }
        }
    }
    exit_codes::SUCCESS
}

fn plan_result(registered: &RegisteredSaga) -> PlanResult {
    let graph = &registered.graph;
    let level_of = |name: &str| {
        graph
            .levels
            .iter()
            .position(|level| level.iter().any(|n| n == name))
            .unwrap_or(0)
    };

    let steps = graph
        .topo_order
        .iter()
        .filter_map(|name| registered.saga.step(name))
        .map(|step| PlannedStep {
            name: step.name.clone(),
            action: step.action.clone(),
            compensating_action: step.compensating_action.clone(),
            requires: graph.dependencies(&step.name).to_vec(),
            timeout: step.deadline().map(format_duration),
            level: level_of(&step.name),
        })
        .collect();

    PlanResult {
        saga: registered.saga.name.clone(),
        topo_order: graph.topo_order.clone(),
        levels: graph.levels.clone(),
        steps,
    }
}

fn print_text(plan: &PlanResult) {
    println!("Saga: {}", plan.saga);
    for (i, level) in plan.levels.iter().enumerate() {
        println!("  level {i}: {}", level.join(", "));
    }
    println!("Steps:");
    for step in &plan.steps {
        let mut line = format!("  - {} -> {}", step.name, step.action);
        if let Some(comp) = &step.compensating_action {
            line.push_str(&format!(" (undo: {comp})"));
        }
        if let Some(t) = &step.timeout {
            line.push_str(&format!(" [timeout {t}]"));
        }
        println!("{line}");
        if !step.requires.is_empty() {
            println!("    requires: {}", step.requires.join(", "));
        }
    }
}
