use std::collections::HashSet;

use crate::types::Saga;
use crate::validate::rules::step;
use crate::validate::validator::Validator;

pub(crate) fn validate_saga(v: &mut Validator, saga: &Saga) {
    v.validate_name("name", &saga.name);

    if saga.steps.is_empty() {
        v.push("steps", "must have at least one entry");
        return;
    }

    let known: HashSet<&str> = saga.steps.iter().map(|s| s.name.as_str()).collect();

    let mut seen = HashSet::<&str>::new();
    for (idx, s) in saga.steps.iter().enumerate() {
        let spath = format!("steps[{idx}]");
        if !s.name.is_empty() && !seen.insert(s.name.as_str()) {
            v.push(format!("{spath}.name"), format!("duplicate step name {:?}", s.name));
        }
        step::validate_step(v, s, &spath, &known);
    }
}
