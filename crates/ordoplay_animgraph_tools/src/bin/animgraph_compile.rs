// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compile an authoring graph (RON) into a runtime graph definition.

use clap::Parser;
use ordoplay_animgraph_tools::{load_graph, CompilerConfig, GraphCompilationContext, LogSeverity};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "animgraph_compile", version, about = "Compile an animation graph into a runtime definition")]
struct Arguments {
    /// Authoring graph (RON)
    input: PathBuf,

    /// Output file, defaults to the input path with a `compiled.<format>` extension
    output: Option<PathBuf>,

    /// Compiler configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ordoplay_animgraph_tools=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Arguments::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Arguments) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };

    let graph = load_graph(&args.input)?;
    let output = GraphCompilationContext::new().compile(&graph)?;

    for entry in &output.log {
        match entry.severity {
            LogSeverity::Info => tracing::debug!(node = ?entry.node_id, "{}", entry.message),
            LogSeverity::Warning => tracing::warn!(node = ?entry.node_id, "{}", entry.message),
            LogSeverity::Error => tracing::error!(node = ?entry.node_id, "{}", entry.message),
        }
    }

    if config.print_node_table {
        for (index, settings) in output.definition.node_settings.iter().enumerate() {
            println!("{index:>5}  {:<24} {}", settings.kind_name(), output.definition.node_ids[index]);
        }
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(format!("compiled.{}", config.output_format.extension())));
    let bytes = config.encode_definition(&output.definition)?;
    std::fs::write(&output_path, bytes)?;

    tracing::info!("Wrote {}", output_path.display());
    Ok(())
}
