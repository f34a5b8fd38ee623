mod compensation;
pub mod concurrency;
pub mod dispatcher;
pub mod events;
pub mod http;
mod result;
mod run;
mod scheduler;
mod step_runner;
mod types;

pub use concurrency::{ParallelismLimit, StepPermit};
pub use dispatcher::{
    DispatchError, DispatchMode, Dispatcher, EchoDispatcher, FnDispatcher, RejectingDispatcher,
    StepInvocation, StepOutput,
};
pub use events::{
    CompositeEventSink, Event, EventEmitter, EventForwarder, EventSink, NoOpEventSink,
    StdoutEventSink, TracingEventSink,
};
pub use http::{HttpDispatcher, HttpDispatcherError};
pub use result::{CompensationReport, ExecutionError, RunReport, StepReport};
pub use scheduler::Executor;
pub use types::ExecutorConfig;
