use crate::error::{ValidationError, Violation};
use crate::types::Saga;

use super::rules;

pub struct Validator {
    saga: String,
    violations: Vec<Violation>,
}

impl Validator {
    pub fn new(saga: &str) -> Self {
        Self {
            saga: saga.to_string(),
            violations: Vec::new(),
        }
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.saga, self.violations))
        }
    }

    pub fn validate_saga(&mut self, saga: &Saga) {
        rules::saga::validate_saga(self, saga);
    }

    pub(crate) fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    pub(crate) fn validate_name(&mut self, path: &str, name: &str) {
        if name.trim().is_empty() {
            self.push(path, "must not be empty");
        }
    }
}
