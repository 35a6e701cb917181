//! `procflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate` — parse and DAG-check a process definition JSON file.
//! - `run`      — execute a process definition end-to-end against the
//!   in-memory store, registering the built-in task types. A worked example
//!   of wiring the engine up, and a smoke-test harness.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use engine::{Engine, EngineConfig, ProcessDefinition};
use nodes::TaskTypeRegistry;
use store::InMemoryCollection;
use tracing::info;

#[derive(Parser)]
#[command(name = "procflow", about = "Process instance execution engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a process definition JSON file.
    Validate {
        /// Path to the definition JSON file.
        path: PathBuf,
    },
    /// Run a process definition to completion (or suspension) against an
    /// in-memory store.
    Run {
        /// Path to the definition JSON file.
        path: PathBuf,
        /// Path to a JSON object of initial variables. Defaults to `{}`.
        #[arg(long)]
        variables: Option<PathBuf>,
    },
}

fn load_definition(path: &PathBuf) -> Result<ProcessDefinition, String> {
    let content = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let doc: store::DefinitionDocument =
        serde_json::from_str(&content).map_err(|e| format!("invalid definition JSON: {e}"))?;
    ProcessDefinition::from_document(doc).map_err(|e| format!("invalid process graph: {e}"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => match load_definition(&path) {
            Ok(definition) => {
                println!(
                    "process definition is valid: {} tasks, {} flows",
                    definition.tasks().len(),
                    definition.flows().len()
                );
            }
            Err(e) => {
                eprintln!("validation failed: {e}");
                std::process::exit(1);
            }
        },
        Command::Run { path, variables } => {
            let definition = match load_definition(&path) {
                Ok(definition) => Arc::new(definition),
                Err(e) => {
                    eprintln!("validation failed: {e}");
                    std::process::exit(1);
                }
            };

            let variables = match variables {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
                    serde_json::from_str(&content).unwrap_or_else(|e| panic!("invalid variables JSON: {e}"))
                }
                None => nodes::Variables::new(),
            };

            let engine = Engine::new(
                TaskTypeRegistry::new(),
                EngineConfig::default(),
                Arc::new(InMemoryCollection::new()),
                Arc::new(InMemoryCollection::new()),
                Vec::new(),
            );

            let instance_id = engine
                .create_process_instance(definition, variables)
                .await
                .unwrap_or_else(|e| panic!("failed to start process instance: {e}"));

            info!(instance_id, "process instance started");

            let handle = engine
                .instance_handle(instance_id)
                .expect("just-created instance is live");
            let instance = handle.lock().await;

            println!("status: {:?}", instance.status());
            println!("variables: {}", serde_json::Value::Object(instance.variables().clone()));
            if let Some(error) = instance.error() {
                println!("error: {error}");
            }
        }
    }
}
