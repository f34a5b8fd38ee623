use std::net::SocketAddr;

use clap::{Args, ValueEnum};

use crate::output::OutputFormat;

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Args, Clone)]
pub struct LogArgs {
    /// Log line format. Verbosity comes from RUST_LOG (default `info`).
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true, env = "SAGA_LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[derive(Debug, Args, Clone)]
pub struct EngineArgs {
    /// Maximum steps in flight per run (unbounded when omitted).
    #[arg(long)]
    pub max_parallelism: Option<usize>,
    #[arg(long, default_value_t = 2000)]
    pub event_timeout_ms: u64,
    #[arg(long, default_value_t = 1000)]
    pub event_flush_timeout_ms: u64,
    /// Deadline for steps that declare no timeout of their own.
    #[arg(long)]
    pub default_step_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DispatcherKind {
    /// Fail every step.
    Reject,
    /// Succeed every step, echoing the action and payload.
    Echo,
    /// POST each step to `--dispatcher-url`.
    Http,
}

#[derive(Debug, Args, Clone)]
pub struct DispatcherArgs {
    #[arg(long, value_enum, default_value_t = DispatcherKind::Reject)]
    pub dispatcher: DispatcherKind,
    #[arg(long, env = "SAGA_DISPATCHER_URL")]
    pub dispatcher_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventsKind {
    Tracing,
    Stdout,
    #[value(name = "none")]
    Off,
}

#[derive(Debug, Args, Clone)]
pub struct EventsArgs {
    #[arg(long, value_enum, default_value_t = EventsKind::Tracing)]
    pub events: EventsKind,
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:8080", env = "SAGA_BIND")]
    pub bind: SocketAddr,
    /// Budget per request; on expiry the run is cancelled and compensated.
    #[arg(long, default_value_t = 30000)]
    pub request_timeout_ms: u64,
}
