mod duration;
mod execution;
mod saga;
mod step;

pub use duration::{format_duration, parse_duration};
pub use execution::{Details, ExecutionRequest, ExecutionResult, Payload, RunStatus, StepStatus};
pub use saga::{Saga, SagaConfig};
pub use step::Step;

pub(crate) use duration::serde_duration;

/// Treats an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    let value = <Option<T> as serde::Deserialize>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
