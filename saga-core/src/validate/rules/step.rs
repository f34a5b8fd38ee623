use std::collections::HashSet;

use crate::types::Step;
use crate::validate::validator::Validator;

pub(crate) fn validate_step(v: &mut Validator, step: &Step, path: &str, known: &HashSet<&str>) {
    v.validate_name(&format!("{path}.name"), &step.name);

    if step.action.trim().is_empty() {
        v.push(format!("{path}.action"), "must not be empty");
    }

    if let Some(comp) = &step.compensating_action {
        if comp.trim().is_empty() {
            v.push(
                format!("{path}.compensating_action"),
                "must not be empty when present",
            );
        }
    }

    let mut seen = HashSet::<&str>::new();
    for (ridx, req) in step.requires.iter().enumerate() {
        let rpath = format!("{path}.requires[{ridx}]");
        if req == &step.name {
            v.push(rpath, "step must not require itself");
        } else if !known.contains(req.as_str()) {
            v.push(rpath, format!("unknown step {req:?}"));
        } else if !seen.insert(req.as_str()) {
            v.push(rpath, format!("duplicate requirement {req:?}"));
        }
    }
}
