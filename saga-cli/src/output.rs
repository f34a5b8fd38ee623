use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    /// Graphviz; only `plan` renders it, other commands fall back to text.
    Dot,
}

/// Prints a serializable result. Text mode pretty-prints, JSON mode emits one line.
pub fn print_result<T: Serialize>(format: OutputFormat, quiet: bool, result: &T) {
    if quiet {
        return;
    }
    let encoded = match format {
        OutputFormat::Json => serde_json::to_string(result),
        OutputFormat::Text | OutputFormat::Dot => serde_json::to_string_pretty(result),
    };
    match encoded {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: failed to encode output: {e}"),
    }
}

pub fn print_error(format: OutputFormat, quiet: bool, message: &str) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Json => {
            let err = serde_json::json!({ "error": message });
            eprintln!("{err}");
        }
        OutputFormat::Text | OutputFormat::Dot => eprintln!("error: {message}"),
    }
}
