#![forbid(unsafe_code)]

//! Runtime engine for executing registered sagas.
//!
//! Definitions, validation and dependency graphs live in `saga-core`; this crate
//! schedules steps, unwinds failures and exposes the [`Coordinator`] facade.

pub mod coordinator;
pub mod executor;

pub use crate::coordinator::Coordinator;
pub use crate::executor::{
    CompensationReport, CompositeEventSink, DispatchError, DispatchMode, Dispatcher,
    EchoDispatcher, Event, EventSink, ExecutionError, Executor, ExecutorConfig, FnDispatcher,
    HttpDispatcher, HttpDispatcherError, NoOpEventSink, RejectingDispatcher, RunReport,
    StdoutEventSink, StepInvocation, StepOutput, StepReport, TracingEventSink,
};
