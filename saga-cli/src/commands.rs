use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and validate every saga in a config file.
    Validate {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// List the sagas defined in a config file.
    Sagas {
        path: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show the dependency levels of one saga.
    Plan {
        path: PathBuf,
        #[arg(long)]
        saga: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Run one saga to completion and print the result.
    Execute {
        path: PathBuf,
        #[arg(long)]
        saga: String,
        /// JSON or YAML file holding the payload object.
        #[arg(long)]
        payload: Option<PathBuf>,
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set_payload: Vec<String>,
        #[arg(long)]
        trace_id: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        engine: EngineArgs,
        #[command(flatten)]
        dispatcher: DispatcherArgs,
        #[command(flatten)]
        events: EventsArgs,
    },
    /// Serve saga execution over HTTP.
    Serve {
        path: PathBuf,
        #[command(flatten)]
        serve: ServeArgs,
        #[command(flatten)]
        engine: EngineArgs,
        #[command(flatten)]
        dispatcher: DispatcherArgs,
        #[command(flatten)]
        events: EventsArgs,
    },
}
