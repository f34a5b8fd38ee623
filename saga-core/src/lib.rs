#![forbid(unsafe_code)]

pub mod error;
pub mod graph;
pub mod parser;
pub mod registry;
pub mod types;
pub mod validate;

pub use crate::error::{NotFoundError, ParseError, SagaError, ValidationError, Violation};
pub use crate::graph::{build_dependency_graph, DependencyGraph};
pub use crate::parser::{load_config_file, parse_config_str, ConfigFormat, ParsedConfig};
pub use crate::registry::{RegisteredSaga, Registry};
pub use crate::types::{
    Details, ExecutionRequest, ExecutionResult, Payload, RunStatus, Saga, SagaConfig, Step,
    StepStatus,
};
pub use crate::validate::{validate_saga, Validate};
