use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{ValidationError, Violation};
use crate::graph::model::DependencyGraph;
use crate::types::Saga;

pub fn build_dependency_graph(saga: &Saga) -> Result<DependencyGraph, ValidationError> {
    let step_names: BTreeSet<String> = saga.steps.iter().map(|s| s.name.clone()).collect();

    let mut violations = Vec::new();
    let mut depends_on: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (idx, step) in saga.steps.iter().enumerate() {
        let mut d = Vec::with_capacity(step.requires.len());
        for (ridx, req) in step.requires.iter().enumerate() {
            let path = format!("steps[{idx}].requires[{ridx}]");
            if req == &step.name {
                violations.push(Violation::new(path, "step must not require itself"));
            } else if !step_names.contains(req) {
                violations.push(Violation::new(path, format!("unknown step {req:?}")));
            } else {
                d.push(req.clone());
            }
        }
        d.sort();
        d.dedup();
        depends_on.insert(step.name.clone(), d);
    }

    if !violations.is_empty() {
        return Err(ValidationError::new(&saga.name, violations));
    }

    let mut dependents: BTreeMap<String, Vec<String>> =
        step_names.iter().map(|n| (n.clone(), Vec::new())).collect();
    for (n, deps) in &depends_on {
        for d in deps {
            if let Some(out) = dependents.get_mut(d) {
                out.push(n.clone());
            }
        }
    }
    for v in dependents.values_mut() {
        v.sort();
    }

    let topo_order = topo_sort(&step_names, &depends_on, &dependents).map_err(|cycle| {
        ValidationError::single(
            &saga.name,
            "steps",
            format!("dependency cycle detected: {}", cycle.join(" -> ")),
        )
    })?;
    let levels = compute_levels(&topo_order, &depends_on);

    Ok(DependencyGraph {
        depends_on,
        dependents,
        levels,
        topo_order,
    })
}

/// Kahn in-degree reduction. On failure returns one concrete cycle.
fn topo_sort(
    nodes: &BTreeSet<String>,
    depends_on: &BTreeMap<String, Vec<String>>,
    dependents: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>, Vec<String>> {
    let mut indeg: BTreeMap<&str, usize> = nodes
        .iter()
        .map(|n| (n.as_str(), depends_on.get(n).map_or(0, Vec::len)))
        .collect();

    let mut q: VecDeque<&str> = indeg
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(n, _)| *n)
        .collect();

    let mut out = Vec::with_capacity(nodes.len());
    while let Some(n) = q.pop_front() {
        out.push(n.to_string());
        for m in dependents.get(n).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(e) = indeg.get_mut(m.as_str()) {
                *e -= 1;
                if *e == 0 {
                    q.push_back(m.as_str());
                }
            }
        }
    }

    if out.len() != nodes.len() {
        let remaining: BTreeSet<&str> = indeg
            .iter()
            .filter(|(_, d)| **d > 0)
            .map(|(n, _)| *n)
            .collect();
        return Err(find_cycle(&remaining, depends_on));
    }
    Ok(out)
}

/// Every node left after Kahn still has an unprocessed requirement, so walking
/// requirements inside the remaining set must revisit a node.
fn find_cycle(remaining: &BTreeSet<&str>, depends_on: &BTreeMap<String, Vec<String>>) -> Vec<String> {
    let Some(start) = remaining.iter().next().copied() else {
        return Vec::new();
    };

    let mut path: Vec<&str> = Vec::new();
    let mut cur = start;
    loop {
        if let Some(pos) = path.iter().position(|p| *p == cur) {
            let mut cycle: Vec<String> = path[pos..].iter().rev().map(|s| s.to_string()).collect();
            if let Some(min) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)).map(|(i, _)| i) {
                cycle.rotate_left(min);
            }
            if let Some(first) = cycle.first().cloned() {
                cycle.push(first);
            }
            return cycle;
        }
        path.push(cur);
        let next = depends_on
            .get(cur)
            .and_then(|deps| deps.iter().find(|d| remaining.contains(d.as_str())));
        match next {
            Some(n) => cur = n.as_str(),
            None => return path.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn compute_levels(topo: &[String], depends_on: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut level: BTreeMap<&str, usize> = BTreeMap::new();
    for node in topo {
        let deps = depends_on.get(node).map(|v| v.as_slice()).unwrap_or(&[]);
        let l = deps
            .iter()
            .filter_map(|d| level.get(d.as_str()).copied())
            .max()
            .map(|m| m + 1)
            .unwrap_or(0);
        level.insert(node.as_str(), l);
    }

    let max_level = level.values().copied().max().unwrap_or(0);
    let mut levels = vec![Vec::<String>::new(); max_level + 1];
    for node in topo {
        levels[level[node.as_str()]].push(node.clone());
    }
    levels
}
