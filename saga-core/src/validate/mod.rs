mod rules;
mod validator;

use crate::error::ValidationError;
use crate::types::Saga;
use validator::Validator;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for Saga {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_saga(self)
    }
}

/// Structural checks on a saga definition. Cycle detection lives in the graph builder.
pub fn validate_saga(saga: &Saga) -> Result<(), ValidationError> {
    let mut v = Validator::new(&saga.name);
    v.validate_saga(saga);
    v.finish()
}
