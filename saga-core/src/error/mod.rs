use thiserror::Error;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A saga definition was rejected at registration time.
///
/// Every problem found is reported, not only the first one.
#[derive(Debug, Clone, Error)]
#[error("saga {saga:?} failed validation: {}", summarize(.violations))]
pub struct ValidationError {
    pub saga: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(saga: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            saga: saga.into(),
            violations,
        }
    }

    pub fn single(saga: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(saga, vec![Violation::new(path, message)])
    }

    /// True when any violation message mentions a dependency cycle.
    pub fn is_cycle(&self) -> bool {
        self.violations.iter().any(|v| v.message.contains("cycle"))
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.path, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("saga not found: {saga_name}")]
pub struct NotFoundError {
    pub saga_name: String,
}

impl NotFoundError {
    pub fn new(saga_name: impl Into<String>) -> Self {
        Self {
            saga_name: saga_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = ValidationError::new(
            "checkout",
            vec![
                Violation::new("checkout.steps[0].name", "must not be empty"),
                Violation::new("checkout.steps[1].requires[0]", "unknown step \"nope\""),
            ],
        );
        let msg = err.to_string();
        assert!(msg.contains("\"checkout\""));
        assert!(msg.contains("steps[0].name: must not be empty"));
        assert!(msg.contains("unknown step"));
        assert!(!err.is_cycle());
    }
}
