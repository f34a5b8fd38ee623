use clap::Parser;

mod args;
mod cmd;
mod commands;
mod exit_codes;
mod logging;
mod output;

pub use args::*;
use commands::Command;

#[derive(Debug, Parser)]
#[command(name = "saga", version, about = "Saga coordinator: run multi-step transactions with compensation")]
struct Cli {
    #[command(flatten)]
    log: LogArgs,
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Validate { path, output } => cmd::validate::validate_cmd(&path, output).await,
        Command::Sagas { path, output } => cmd::sagas::sagas_cmd(&path, output).await,
        Command::Plan { path, saga, output } => cmd::plan::plan_cmd(&path, &saga, output).await,
        Command::Execute {
            path,
            saga,
            payload,
            set_payload,
            trace_id,
            output,
            engine,
            dispatcher,
            events,
        } => {
            cmd::execute::execute_cmd(
                &path,
                &saga,
                payload.as_deref(),
                &set_payload,
                trace_id.as_deref(),
                output,
                engine,
                dispatcher,
                events,
            )
            .await
        }
        Command::Serve {
            path,
            serve,
            engine,
            dispatcher,
            events,
        } => cmd::serve::serve_cmd(&path, serve, engine, dispatcher, events).await,
    }
}
