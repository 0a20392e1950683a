//! console-state probe: exercises the state core against a live API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use console_state::attempt::AttemptStatus;
use console_state::config::Config;
use console_state::telemetry::init_tracing;
use console_state::{
    Action, AttemptTracker, Collection, HttpClient, Orchestrator, Record, SegmentDef, Store,
};

const RESOURCES_SEGMENT: &str = "resources";

#[derive(Parser)]
#[command(name = "console-state")]
#[command(about = "Run tracked requests through the console state core")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/console-state/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override server.base_url from the config
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch API paths concurrently as one tracked operation
    Get {
        /// Paths relative to the base URL
        #[arg(required = true)]
        paths: Vec<String>,

        /// Operation id recorded in the attempt tracker
        #[arg(long, default_value = "probe")]
        operation: String,
    },
}

/// One fetched API resource.
#[derive(Debug, Clone, PartialEq)]
struct Resource {
    path: String,
    body: Value,
}

impl Record for Resource {
    type Key = String;

    fn key(&self) -> String {
        self.path.clone()
    }
}

#[derive(Debug)]
enum ResourcesAction {
    Loaded(Vec<Resource>),
}

impl Action for ResourcesAction {
    fn tag(&self) -> &'static str {
        "resources/loaded"
    }
}

fn resources_segment() -> SegmentDef<Collection<Resource>> {
    SegmentDef::new(RESOURCES_SEGMENT, Collection::new()).on(
        |state: &Arc<Collection<Resource>>, action: &ResourcesAction| match action {
            ResourcesAction::Loaded(resources) => {
                Collection::upsert_all(state, resources.iter().cloned())
            }
        },
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(base_url) = cli.base_url {
        config.server.base_url = base_url;
        config.validate()?;
    }
    init_tracing(&config.logging.filter);

    let client = HttpClient::new(&config.server).context("Failed to create HTTP client")?;
    let store = Store::new();
    store.register(resources_segment())?;
    let tracker = AttemptTracker::install(&store)?;
    let orchestrator = Orchestrator::new(tracker.clone(), Arc::new(client));

    match cli.command {
        Command::Get { paths, operation } => {
            let watched = tracker.getter(&operation);
            let subscription = store.subscribe(&watched, |attempt| {
                tracing::info!(status = %attempt.status, "Attempt changed");
            })?;

            let fetched = paths.clone();
            let outcome = orchestrator
                .operation(operation.as_str())
                .requests(paths.iter().map(console_state::Request::get))
                .combine(Value::Array)
                .post_process(move |store, combined| {
                    let bodies = combined.as_array().cloned().unwrap_or_default();
                    let resources = fetched
                        .into_iter()
                        .zip(bodies)
                        .map(|(path, body)| Resource { path, body })
                        .collect();
                    store.dispatch(ResourcesAction::Loaded(resources))?;
                    Ok(())
                })
                .run()
                .await;
            store.unsubscribe(subscription);

            let attempt = tracker.attempt(&operation)?;
            println!("{}: {}", operation, attempt.status);
            match attempt.status {
                AttemptStatus::Succeeded => {
                    let stored = store.get::<Collection<Resource>>(RESOURCES_SEGMENT)?;
                    for resource in stored.iter() {
                        println!("--- {}", resource.path);
                        println!("{}", serde_json::to_string_pretty(&resource.body)?);
                    }
                }
                _ => {
                    if let Some(message) = &attempt.message {
                        eprintln!("error: {}", message);
                    }
                }
            }

            if outcome.is_err() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
