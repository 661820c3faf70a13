// SPDX-License-Identifier: MIT OR Apache-2.0
//! `WorldGraph` runner
//!
//! Loads an engine configuration, builds the demo graph and runs it through
//! the graph processor:
//!
//! ```text
//! worldgraph [CONFIG.ron]
//! ```
//!
//! `RUST_LOG` overrides the configured log filter.

mod demo;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use worldgraph_graph::{
    create_builtin_catalog, ConfigError, EngineConfig, GraphProcessor, PassOutcome, PortRegistry,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to load config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("Failed to build demo graph: {0}")]
    Demo(#[from] demo::DemoError),

    #[error("{failed} of {total} pass(es) did not complete")]
    Incomplete { failed: usize, total: usize },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    match path {
        Some(path) => EngineConfig::load(path).map_err(|source| CliError::Config {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(EngineConfig::default()),
    }
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn report(pass: usize, outcome: &PassOutcome) -> bool {
    if outcome.completed {
        tracing::info!(
            "Pass {} ({:?}) finished in {:?}: {} node(s), {} link(s) skipped",
            pass,
            outcome.kind,
            outcome.elapsed,
            outcome.processed_nodes,
            outcome.skipped_links
        );
    } else if let Some(err) = &outcome.error {
        tracing::error!(
            "Pass {} ({:?}) failed after {:?}: {}",
            pass,
            outcome.kind,
            outcome.elapsed,
            err
        );
    }
    if !outcome.removed_links.is_empty() {
        tracing::warn!("Pass {} removed {} broken link(s)", pass, outcome.removed_links.len());
    }
    outcome.completed
}

fn run(config: &EngineConfig) -> Result<(), CliError> {
    let catalog = create_builtin_catalog();
    let registry = PortRegistry::from_catalog(&catalog).into_shared();

    let (mut graph, nodes) = demo::build_demo_graph(&catalog, &registry.read(), config.mode)?;
    graph.apply_settings(&config.settings);
    tracing::info!(
        "Running graph `{}` in {:?} mode ({} nodes, {} links, seed {})",
        graph.name,
        graph.mode(),
        graph.node_count(),
        graph.link_count(),
        graph.settings().seed
    );

    let mut processor = GraphProcessor::new(registry);
    processor.update_node_table(graph.node_ids().collect::<Vec<_>>());

    let mut failed = 0;
    if !report(0, &processor.process_once(&mut graph)) {
        failed += 1;
    }
    for pass in 1..=config.passes as usize {
        if !report(pass, &processor.process(&mut graph)) {
            failed += 1;
        }
    }

    let sum = graph.node(nodes.add).and_then(|n| n.fields().value("sum"));
    let result = graph.node(nodes.log).and_then(|n| n.fields().value("value"));
    if let (Some(sum), Some(result)) = (sum, result) {
        tracing::info!("Sum {} scaled by subgraph to {}", sum, result);
    }
    if let Some(duration) = graph.node(nodes.external).and_then(|n| n.last_process_duration) {
        tracing::debug!("Subgraph `{}` took {:?}", demo::SCALE_SUBGRAPH, duration);
    }

    if failed > 0 {
        return Err(CliError::Incomplete {
            failed,
            total: config.passes as usize + 1,
        });
    }
    Ok(())
}

fn main() -> ExitCode {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = load_config(path.as_deref());

    let filter = config.as_ref().map_or("info", |c| c.log_filter.as_str());
    init_tracing(filter);
    tracing::info!("Starting WorldGraph v{}", env!("CARGO_PKG_VERSION"));

    let result = config.and_then(|config| run(&config));
    if let Err(e) = result {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_runs() {
        let config = EngineConfig {
            passes: 2,
            ..EngineConfig::default()
        };
        assert!(run(&config).is_ok());
    }

    #[test]
    fn test_missing_config_file() {
        let err = load_config(Some(Path::new("/nonexistent/worldgraph.ron"))).unwrap_err();
        assert!(matches!(err, CliError::Config { source: ConfigError::Io(_), .. }));
    }
}
