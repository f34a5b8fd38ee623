use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use saga_core::{load_config_file, ParseError, ParsedConfig, Payload, Registry};
use saga_exec::{
    Coordinator, Dispatcher, EchoDispatcher, EventSink, ExecutorConfig, HttpDispatcher,
    NoOpEventSink, RejectingDispatcher, StdoutEventSink, TracingEventSink,
};

use crate::exit_codes;
use crate::output::print_error;
use crate::{DispatcherArgs, DispatcherKind, EngineArgs, EventsArgs, EventsKind, OutputArgs};

/// Reads and parses a config file, mapping failures to an exit code.
pub fn load_config(path: &Path, output: &OutputArgs) -> Result<ParsedConfig, i32> {
    match load_config_file(path) {
        Ok(parsed) => Ok(parsed),
        Err(ParseError::Io(e)) => {
            print_error(
                output.format,
                output.quiet,
                &format!("failed to read {}: {e}", path.display()),
            );
            Err(exit_codes::RUNTIME_ERROR)
        }
        Err(e) => {
            print_error(output.format, output.quiet, &format!("{}: {e}", path.display()));
            Err(exit_codes::VALIDATION_FAILED)
        }
    }
}

/// Loads the config and registers every saga; the first invalid one aborts.
pub fn load_registry(path: &Path, output: &OutputArgs) -> Result<Arc<Registry>, i32> {
    let parsed = load_config(path, output)?;
    match Registry::from_sagas(parsed.config.sagas) {
        Ok(registry) => Ok(Arc::new(registry)),
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            Err(exit_codes::VALIDATION_FAILED)
        }
    }
}

pub fn load_payload(path: Option<&Path>, output: &OutputArgs) -> Result<Payload, i32> {
    let Some(path) = path else {
        return Ok(Payload::new());
    };
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to read payload: {e}"));
            return Err(exit_codes::RUNTIME_ERROR);
        }
    };

    let value = serde_json::from_str::<serde_json::Value>(&content)
        .ok()
        .or_else(|| serde_yaml::from_str::<serde_json::Value>(&content).ok());
    match value {
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(_) => {
            print_error(output.format, output.quiet, "payload must be an object");
            Err(exit_codes::VALIDATION_FAILED)
        }
        None => {
            print_error(output.format, output.quiet, "payload file is neither valid JSON nor YAML");
            Err(exit_codes::VALIDATION_FAILED)
        }
    }
}

/// Applies `KEY=VALUE` overrides. Values that parse as JSON keep their type,
/// anything else is taken as a string.
pub fn merge_set_payload(payload: &mut Payload, set_payload: &[String]) -> Result<(), String> {
    for s in set_payload {
        let Some((k, v)) = s.split_once('=') else {
            return Err(format!("invalid --set {s:?}: expected KEY=VALUE"));
        };
        if k.is_empty() {
            return Err(format!("invalid --set {s:?}: empty key"));
        }
        let value = serde_json::from_str(v).unwrap_or_else(|_| serde_json::Value::String(v.to_string()));
        payload.insert(k.to_string(), value);
    }
    Ok(())
}

pub fn build_executor_config(engine: &EngineArgs) -> ExecutorConfig {
    ExecutorConfig {
        max_parallelism: engine.max_parallelism,
        default_step_timeout: engine.default_step_timeout_ms.map(Duration::from_millis),
        event_timeout: Duration::from_millis(engine.event_timeout_ms),
        event_flush_timeout: Duration::from_millis(engine.event_flush_timeout_ms),
    }
}

pub fn build_dispatcher(args: &DispatcherArgs) -> Result<Arc<dyn Dispatcher>, String> {
    match args.dispatcher {
        DispatcherKind::Reject => Ok(Arc::new(RejectingDispatcher)),
        DispatcherKind::Echo => Ok(Arc::new(EchoDispatcher)),
        DispatcherKind::Http => {
            let url = args
                .dispatcher_url
                .as_deref()
                .ok_or_else(|| "--dispatcher http requires --dispatcher-url".to_string())?;
            let dispatcher = HttpDispatcher::new(url).map_err(|e| e.to_string())?;
            Ok(Arc::new(dispatcher))
        }
    }
}

pub fn build_event_sink(args: &EventsArgs) -> Arc<dyn EventSink> {
    match args.events {
        EventsKind::Tracing => Arc::new(TracingEventSink),
        EventsKind::Stdout => Arc::new(StdoutEventSink),
        EventsKind::Off => Arc::new(NoOpEventSink),
    }
}

pub fn build_coordinator(
    registry: Arc<Registry>,
    engine: &EngineArgs,
    dispatcher: &DispatcherArgs,
    events: &EventsArgs,
) -> Result<Coordinator, String> {
    Ok(Coordinator::new(registry, build_executor_config(engine))
        .with_dispatcher(build_dispatcher(dispatcher)?)
        .with_event_sink(build_event_sink(events)))
}
