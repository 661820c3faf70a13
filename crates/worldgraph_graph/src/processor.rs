// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution passes.
//!
//! A pass walks a compute order, runs every scheduled node and then pushes
//! its outputs along its outgoing links. Interactive graphs validate links,
//! repair what they can and keep going. Real graphs stop at the first error.

use crate::error::ProcessError;
use crate::graph::{Graph, SUBGRAPH_INPUT_PORT, SUBGRAPH_OUTPUT_PORT};
use crate::link::{Link, LinkId};
use crate::node::NodeId;
use crate::propagate::LinkPropagator;
use crate::registry::{PortRegistry, SharedPortRegistry};
use crate::scheduler::{subgraph_tag, ComputeEntry};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Which entry point produced a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Every scheduled node
    Full,
    /// A caller-chosen set of nodes
    Subset,
    /// One-shot initialization of every scheduled node
    Once,
}

/// Result of one pass
#[derive(Debug)]
pub struct PassOutcome {
    /// Entry point that ran
    pub kind: PassKind,
    /// Time spent in node invocations that succeeded
    pub elapsed: Duration,
    /// Whether the pass reached its end
    pub completed: bool,
    /// Error that ended the pass early
    pub error: Option<ProcessError>,
    /// Number of nodes invoked successfully
    pub processed_nodes: usize,
    /// Links dropped while repairing the graph
    pub removed_links: Vec<LinkId>,
    /// Links skipped because of a recoverable error
    pub skipped_links: usize,
}

impl PassOutcome {
    fn new(kind: PassKind) -> Self {
        Self {
            kind,
            elapsed: Duration::ZERO,
            completed: false,
            error: None,
            processed_nodes: 0,
            removed_links: Vec::new(),
            skipped_links: 0,
        }
    }

    fn merge_nested(&mut self, nested: PassOutcome) {
        self.processed_nodes += nested.processed_nodes;
        self.removed_links.extend(nested.removed_links);
        self.skipped_links += nested.skipped_links;
    }
}

/// Runs passes over graphs
pub struct GraphProcessor {
    registry: SharedPortRegistry,
    node_table: Option<HashSet<NodeId>>,
    has_processed: bool,
}

impl GraphProcessor {
    /// Create a processor reading ports from `registry`
    pub fn new(registry: SharedPortRegistry) -> Self {
        Self {
            registry,
            node_table: None,
            has_processed: false,
        }
    }

    /// Port tables used by this processor
    pub fn registry(&self) -> &SharedPortRegistry {
        &self.registry
    }

    /// Whether the last pass reached its end
    pub fn has_processed(&self) -> bool {
        self.has_processed
    }

    /// Inject the ids of the live nodes. Links to other ids are dangling.
    pub fn update_node_table(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.node_table = Some(ids.into_iter().collect());
    }

    /// Validate destinations against the graph itself again
    pub fn clear_node_table(&mut self) {
        self.node_table = None;
    }

    /// Run every scheduled node, computing the order first if needed
    pub fn process(&mut self, graph: &mut Graph) -> PassOutcome {
        self.finish(graph, PassKind::Full, |pass, graph, outcome| {
            pass.run_graph(graph, outcome)
        })
    }

    /// Run only `nodes`, ordered by their cached rank
    pub fn process_subset(&mut self, graph: &mut Graph, nodes: &[NodeId]) -> PassOutcome {
        let mut entries: Vec<ComputeEntry> = nodes
            .iter()
            .filter_map(|&id| {
                let Some(node) = graph.node(id) else {
                    tracing::warn!("Node {} is not part of graph `{}`", id, graph.name);
                    return None;
                };
                Some(ComputeEntry {
                    node: id,
                    rank: node.compute_rank,
                    subgraph: subgraph_tag(graph, node),
                })
            })
            .collect();
        entries.sort_by_key(|entry| entry.rank);

        self.finish(graph, PassKind::Subset, |pass, graph, outcome| {
            pass.run_entries(graph, &entries, outcome)
        })
    }

    /// Run every scheduled node's one-shot initialization
    pub fn process_once(&mut self, graph: &mut Graph) -> PassOutcome {
        self.finish(graph, PassKind::Once, |pass, graph, outcome| {
            pass.run_graph(graph, outcome)
        })
    }

    fn finish(
        &mut self,
        graph: &mut Graph,
        kind: PassKind,
        run: impl FnOnce(&Pass<'_>, &mut Graph, &mut PassOutcome) -> Result<(), ProcessError>,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::new(kind);
        {
            let registry = self.registry.read();
            let pass = Pass {
                registry: &registry,
                node_table: self.node_table.as_ref(),
                kind,
            };
            match run(&pass, graph, &mut outcome) {
                Ok(()) => outcome.completed = true,
                Err(err) => {
                    tracing::error!("{:?} pass over `{}` aborted: {}", kind, graph.name, err);
                    outcome.error = Some(err);
                }
            }
        }

        tracing::debug!(
            "{:?} pass over `{}`: {} node(s) in {:?}, {} link(s) removed, {} skipped",
            kind,
            graph.name,
            outcome.processed_nodes,
            outcome.elapsed,
            outcome.removed_links.len(),
            outcome.skipped_links
        );
        self.has_processed = outcome.completed;
        outcome
    }
}

/// State of one running pass, shared with nested subgraph passes
struct Pass<'a> {
    registry: &'a PortRegistry,
    node_table: Option<&'a HashSet<NodeId>>,
    kind: PassKind,
}

impl Pass<'_> {
    fn run_graph(&self, graph: &mut Graph, outcome: &mut PassOutcome) -> Result<(), ProcessError> {
        if graph.compute_sorted_nodes().is_none() {
            graph.update_compute_order()?;
        }
        let entries = graph
            .compute_sorted_nodes()
            .map(<[ComputeEntry]>::to_vec)
            .unwrap_or_default();
        self.run_entries(graph, &entries, outcome)
    }

    fn run_entries(
        &self,
        graph: &mut Graph,
        entries: &[ComputeEntry],
        outcome: &mut PassOutcome,
    ) -> Result<(), ProcessError> {
        for entry in entries.iter().filter(|e| e.is_scheduled()) {
            self.run_entry(graph, entry, outcome)?;
        }
        Ok(())
    }

    fn run_entry(
        &self,
        graph: &mut Graph,
        entry: &ComputeEntry,
        outcome: &mut PassOutcome,
    ) -> Result<(), ProcessError> {
        if !graph.contains_node(entry.node) {
            tracing::debug!("Node {} left graph `{}` before it ran", entry.node, graph.name);
            return Ok(());
        }
        let interactive = !graph.is_real_mode();

        let duration = {
            let _span = interactive
                .then(|| tracing::trace_span!("process_node", node = %entry.node).entered());
            let start = Instant::now();
            match &entry.subgraph {
                Some(name) => self.run_subgraph(graph, entry.node, name, outcome)?,
                None => self.invoke(graph, entry.node)?,
            }
            start.elapsed()
        };

        outcome.elapsed += duration;
        outcome.processed_nodes += 1;
        if interactive {
            if let Some(node) = graph.node_mut(entry.node) {
                node.last_process_duration = Some(duration);
            }
        }

        self.propagate_links(graph, entry.node, outcome)
    }

    fn invoke(&self, graph: &mut Graph, node_id: NodeId) -> Result<(), ProcessError> {
        let Some(node) = graph.node_mut(node_id) else {
            return Ok(());
        };
        let result = match self.kind {
            PassKind::Once => node.process_once(),
            PassKind::Full | PassKind::Subset => node.process(),
        };
        result.map_err(|source| ProcessError::NodeComputation {
            node: node_id,
            source,
        })
    }

    fn run_subgraph(
        &self,
        graph: &mut Graph,
        node_id: NodeId,
        name: &str,
        outcome: &mut PassOutcome,
    ) -> Result<(), ProcessError> {
        let input = graph
            .node(node_id)
            .and_then(|n| n.fields().get(SUBGRAPH_INPUT_PORT))
            .cloned();
        let Some(subgraph) = graph.subgraph_mut(name) else {
            tracing::warn!("Subgraph `{}` disappeared, running {} directly", name, node_id);
            return self.invoke(graph, node_id);
        };

        let wrap = |source: ProcessError| ProcessError::Subgraph {
            name: name.to_string(),
            source: Box::new(source),
        };

        if let (Some(field), Some(input_node)) = (input, subgraph.input_node()) {
            if let Some(node) = subgraph.node_mut(input_node) {
                node.fields_mut()
                    .set_field(SUBGRAPH_OUTPUT_PORT, field)
                    .map_err(|source| {
                        wrap(ProcessError::FieldWrite {
                            port: SUBGRAPH_OUTPUT_PORT.to_string(),
                            source,
                        })
                    })?;
            }
        }

        let nested = Pass {
            registry: self.registry,
            node_table: None,
            kind: match self.kind {
                PassKind::Once => PassKind::Once,
                PassKind::Full | PassKind::Subset => PassKind::Full,
            },
        };
        let mut nested_outcome = PassOutcome::new(nested.kind);
        let result = nested.run_graph(subgraph, &mut nested_outcome);
        outcome.merge_nested(nested_outcome);
        result.map_err(wrap)?;

        let output = subgraph
            .output_node()
            .and_then(|id| subgraph.node(id))
            .and_then(|n| n.fields().get(SUBGRAPH_INPUT_PORT))
            .cloned();
        if let (Some(field), Some(node)) = (output, graph.node_mut(node_id)) {
            node.fields_mut()
                .set_field(SUBGRAPH_OUTPUT_PORT, field)
                .map_err(|source| ProcessError::FieldWrite {
                    port: SUBGRAPH_OUTPUT_PORT.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn propagate_links(
        &self,
        graph: &mut Graph,
        node_id: NodeId,
        outcome: &mut PassOutcome,
    ) -> Result<(), ProcessError> {
        // Removals are applied after the loop
        let links: Vec<Link> = match graph.node(node_id) {
            Some(node) if !node.outgoing_links().is_empty() => node.outgoing_links().to_vec(),
            _ => return Ok(()),
        };
        let real_mode = graph.is_real_mode();
        let _span = (!real_mode).then(|| {
            tracing::trace_span!("process_links", node = %node_id, links = links.len()).entered()
        });

        let propagator =
            LinkPropagator::new(self.registry, real_mode).with_node_table(self.node_table);
        let mut removals = Vec::new();

        for link in &links {
            let Err(err) = propagator.propagate(link, graph) else {
                continue;
            };
            if real_mode || !err.is_recoverable() {
                return Err(err);
            }

            // A broken link abandons the rest of this node's links
            if err.removes_link() {
                tracing::error!("{}, removing link {}", err, link);
                removals.push(link.id);
                break;
            } else if matches!(err, ProcessError::NullSourceValue { .. }) {
                if self.kind == PassKind::Once {
                    tracing::trace!("{}, skipping link {}", err, link);
                } else {
                    tracing::info!("{}, skipping link {}", err, link);
                }
                outcome.skipped_links += 1;
            } else {
                tracing::error!("{}, skipping link {}", err, link);
                outcome.skipped_links += 1;
            }
        }

        for link_id in removals {
            if graph.remove_link(link_id, false).is_some() {
                outcome.removed_links.push(link_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEvent, GraphMode};
    use crate::link::Anchor;
    use crate::node::{Node, EXCLUDED_RANK};
    use crate::port::{PortField, PortValue};
    use crate::testing::{test_catalog, test_graph, test_registry, test_shared_registry, SpawnExt};

    fn processor() -> GraphProcessor {
        GraphProcessor::new(test_shared_registry())
    }

    fn set(graph: &mut Graph, node: NodeId, port: &str, value: f32) {
        graph.node_mut(node).unwrap().fields_mut().set_value(port, value).unwrap();
    }

    fn value(graph: &Graph, node: NodeId, port: &str) -> Option<PortValue> {
        graph.node(node).unwrap().fields().value(port).cloned()
    }

    #[test]
    fn test_scalar_link_scenario() {
        let registry = test_registry();
        let mut graph = test_graph().with_mode(GraphMode::Real);
        let a = graph.spawn("source").unwrap();
        let b = graph.spawn("sink").unwrap();
        let link = graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        set(&mut graph, a, "out", 5.0);

        let mut processor = processor();
        for _ in 0..2 {
            let outcome = processor.process(&mut graph);
            assert!(outcome.completed);
            assert!(processor.has_processed());
            assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(5.0)));
        }

        graph.remove_link(link, true).unwrap();
        set(&mut graph, a, "out", 9.0);
        let outcome = processor.process(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.processed_nodes, 0);
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(5.0)));
    }

    #[test]
    fn test_array_slot_scenario() {
        let registry = test_registry();
        let mut graph = test_graph();
        let x = graph.spawn("source").unwrap();
        let c = graph.spawn("collector").unwrap();
        graph
            .connect(&registry, Anchor::scalar(x, "out"), Anchor::slot(c, "items", 1))
            .unwrap();
        set(&mut graph, x, "out", 2.5);

        assert!(processor().process(&mut graph).completed);

        let items = graph.node(c).unwrap().fields().array("items").unwrap();
        assert_eq!(items.at(1).unwrap(), Some(&PortValue::Float(2.5)));
        assert_eq!(items.source_at(1), Some("out"));
        assert_eq!(items.at(0).unwrap(), None);
        assert_eq!(items.at(2).unwrap(), None);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_slot_force_write_replaces_occupant() {
        let registry = test_registry();
        let mut graph = test_graph();
        let x = graph.spawn("source").unwrap();
        let c = graph.spawn("collector").unwrap();
        graph
            .connect(&registry, Anchor::scalar(x, "out"), Anchor::slot(c, "items", 1))
            .unwrap();
        graph
            .node_mut(c)
            .unwrap()
            .fields_mut()
            .array_mut("items")
            .unwrap()
            .assign_at(1, Some(PortValue::Float(1.0)), "previous", false)
            .unwrap();
        set(&mut graph, x, "out", 4.0);

        processor().process(&mut graph);

        let items = graph.node(c).unwrap().fields().array("items").unwrap();
        assert_eq!(items.at(1).unwrap(), Some(&PortValue::Float(4.0)));
        assert_eq!(items.source_at(1), Some("out"));
    }

    #[test]
    fn test_null_source_is_skipped() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let b = graph.spawn("sink").unwrap();
        let link = graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        set(&mut graph, b, "in", 1.0);

        let outcome = processor().process(&mut graph);
        assert!(outcome.completed);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.skipped_links, 1);
        assert!(graph.link(link).is_some());
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(1.0)));
    }

    #[test]
    fn test_real_mode_fails_fast() {
        let registry = test_registry();
        let mut graph = test_graph().with_mode(GraphMode::Real);
        let a = graph.spawn("source").unwrap();
        let f = graph.spawn("failing").unwrap();
        let b = graph.spawn("sink").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(f, "in"))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(f, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        set(&mut graph, a, "out", 1.0);
        set(&mut graph, f, "out", 3.0);

        let mut processor = processor();
        let started = Instant::now();
        let outcome = processor.process(&mut graph);
        let wall = started.elapsed();

        assert!(!outcome.completed);
        assert!(!processor.has_processed());
        assert!(matches!(
            outcome.error,
            Some(ProcessError::NodeComputation { node, .. }) if node == f
        ));
        assert_eq!(outcome.processed_nodes, 1);
        assert!(outcome.elapsed <= wall);
        // Nothing downstream of the failure ran
        assert_eq!(value(&graph, b, "in"), None);
        assert!(graph.node(a).unwrap().last_process_duration.is_none());
    }

    #[test]
    fn test_elapsed_excludes_failing_node() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let r = graph.spawn("relay").unwrap();
        let f = graph.spawn("failing").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(r, "in"))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(r, "out"), Anchor::scalar(f, "in"))
            .unwrap();
        set(&mut graph, a, "out", 1.0);

        let outcome = processor().process(&mut graph);
        assert!(!outcome.completed);
        assert_eq!(outcome.processed_nodes, 2);

        let measured: Duration = [a, r]
            .iter()
            .filter_map(|id| graph.node(*id).unwrap().last_process_duration)
            .sum();
        assert_eq!(outcome.elapsed, measured);
        assert!(graph.node(f).unwrap().last_process_duration.is_none());
    }

    #[test]
    fn test_dangling_link_is_removed() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let r = graph.spawn("relay").unwrap();
        let b = graph.spawn("sink").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(r, "in"))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(r, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        let bad = graph
            .insert_link(Link::new(Anchor::scalar(a, "out"), Anchor::scalar(NodeId(99), "in")))
            .unwrap();
        set(&mut graph, a, "out", 6.0);
        graph.drain_events();

        let outcome = processor().process(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.removed_links, vec![bad]);
        assert!(graph.link(bad).is_none());
        assert_eq!(graph.link_count(), 2);
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(6.0)));
        assert!(graph
            .drain_events()
            .iter()
            .all(|e| !matches!(e, GraphEvent::LinkRemoved(_))));
    }

    #[test]
    fn test_real_mode_dangling_link_aborts() {
        let mut graph = test_graph().with_mode(GraphMode::Real);
        let a = graph.spawn("source").unwrap();
        let bad = graph
            .insert_link(Link::new(Anchor::scalar(a, "out"), Anchor::scalar(NodeId(99), "in")))
            .unwrap();
        set(&mut graph, a, "out", 6.0);

        let outcome = processor().process(&mut graph);
        assert!(!outcome.completed);
        assert!(matches!(outcome.error, Some(ProcessError::DanglingNode { .. })));
        assert!(graph.link(bad).is_some());
    }

    #[test]
    fn test_broken_link_abandons_remaining_links_of_node() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let b = graph.spawn("sink").unwrap();
        let d = graph.spawn("source").unwrap();
        let c = graph.spawn("counter").unwrap();
        let bad = graph
            .insert_link(Link::new(Anchor::scalar(a, "out"), Anchor::scalar(NodeId(99), "in")))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(d, "out"), Anchor::scalar(c, "in"))
            .unwrap();
        set(&mut graph, a, "out", 5.0);

        let mut processor = processor();
        let outcome = processor.process(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.removed_links, vec![bad]);
        assert_eq!(value(&graph, b, "in"), None);
        // Later nodes still run
        assert_eq!(value(&graph, c, "count"), Some(PortValue::Int(1)));

        // With the broken link gone the next pass delivers the value
        let outcome = processor.process(&mut graph);
        assert!(outcome.completed);
        assert!(outcome.removed_links.is_empty());
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(5.0)));
    }

    fn out_of_bounds_slot_graph(mode: GraphMode) -> (Graph, LinkId, NodeId) {
        let registry = test_registry();
        let mut graph = test_graph().with_mode(mode);
        let x = graph.spawn("source").unwrap();
        let c = graph.spawn("collector").unwrap();
        let counter = graph.spawn("counter").unwrap();
        let link = graph
            .insert_link(Link::new(Anchor::scalar(x, "out"), Anchor::slot(c, "items", 9)))
            .unwrap();
        graph
            .connect(&registry, Anchor::slot(c, "outs", 0), Anchor::scalar(counter, "in"))
            .unwrap();
        set(&mut graph, x, "out", 1.0);
        (graph, link, counter)
    }

    #[test]
    fn test_interactive_slot_failure_skips_link() {
        let (mut graph, link, counter) = out_of_bounds_slot_graph(GraphMode::Interactive);

        let outcome = processor().process(&mut graph);
        assert!(outcome.completed);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.skipped_links, 1);
        assert!(outcome.removed_links.is_empty());
        assert!(graph.link(link).is_some());
        assert_eq!(outcome.processed_nodes, 3);
        assert_eq!(value(&graph, counter, "count"), Some(PortValue::Int(1)));
    }

    #[test]
    fn test_real_mode_slot_failure_aborts() {
        let (mut graph, link, counter) = out_of_bounds_slot_graph(GraphMode::Real);

        let outcome = processor().process(&mut graph);
        assert!(!outcome.completed);
        assert!(matches!(
            outcome.error,
            Some(ProcessError::SlotAssignment { index: 9, .. })
        ));
        assert_eq!(outcome.processed_nodes, 1);
        assert!(graph.link(link).is_some());
        assert_eq!(value(&graph, counter, "count"), Some(PortValue::Int(0)));
    }

    #[test]
    fn test_subset_runs_in_rank_order() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let r = graph.spawn("relay").unwrap();
        let b = graph.spawn("sink").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(r, "in"))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(r, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        set(&mut graph, a, "out", 1.0);

        let mut processor = processor();
        processor.process(&mut graph);
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(1.0)));

        // Running the relay before the source would forward the stale value
        set(&mut graph, a, "out", 7.0);
        let outcome = processor.process_subset(&mut graph, &[r, a]);
        assert!(outcome.completed);
        assert_eq!(outcome.kind, PassKind::Subset);
        assert_eq!(outcome.processed_nodes, 2);
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(7.0)));
    }

    #[test]
    fn test_excluded_nodes_never_run() {
        let registry = test_registry();
        let mut graph = test_graph();
        let lonely = graph.spawn("counter").unwrap();
        let a = graph.spawn("source").unwrap();
        let counted = graph.spawn("counter").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(counted, "in"))
            .unwrap();

        let mut processor = processor();
        processor.process(&mut graph);
        processor.process_subset(&mut graph, &[lonely, counted]);

        let count = |id| graph.node(id).unwrap().fields().value("count").cloned();
        assert_eq!(graph.node(lonely).unwrap().compute_rank, EXCLUDED_RANK);
        assert_eq!(count(lonely), Some(PortValue::Int(0)));
        assert_eq!(count(counted), Some(PortValue::Int(2)));
    }

    #[test]
    fn test_once_pass_runs_initialization() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let counter = graph.spawn("counter").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(counter, "in"))
            .unwrap();

        let mut processor = processor();
        let outcome = processor.process_once(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.kind, PassKind::Once);
        // The unset source output is skipped, not fatal
        assert_eq!(outcome.skipped_links, 1);
        let count = |graph: &Graph| graph.node(counter).unwrap().fields().value("count").cloned();
        assert_eq!(count(&graph), Some(PortValue::Int(100)));

        processor.process(&mut graph);
        assert_eq!(count(&graph), Some(PortValue::Int(1)));
    }

    #[test]
    fn test_cycle_aborts_pass() {
        let mut graph = test_graph();
        let a = graph.spawn("relay").unwrap();
        let b = graph.spawn("relay").unwrap();
        graph.insert_link(Link::new(Anchor::scalar(a, "out"), Anchor::scalar(b, "in")));
        graph.insert_link(Link::new(Anchor::scalar(b, "out"), Anchor::scalar(a, "in")));

        let mut processor = processor();
        let outcome = processor.process(&mut graph);
        assert!(!outcome.completed);
        assert!(matches!(outcome.error, Some(ProcessError::CyclicGraph(_))));
        assert_eq!(outcome.processed_nodes, 0);
        assert!(!processor.has_processed());
    }

    #[test]
    fn test_node_table_masks_destinations() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let b = graph.spawn("sink").unwrap();
        let link = graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        set(&mut graph, a, "out", 1.0);

        let mut processor = processor();
        processor.update_node_table([a]);
        let outcome = processor.process(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.removed_links, vec![link]);
        assert_eq!(value(&graph, b, "in"), None);

        processor.clear_node_table();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        processor.process(&mut graph);
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(1.0)));
    }

    #[test]
    fn test_registry_rebuild_is_seen_by_processor() {
        let registry = test_registry();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let b = graph.spawn("sink").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::scalar(b, "in"))
            .unwrap();
        set(&mut graph, a, "out", 1.0);

        let mut processor = processor();
        processor.registry().write().clear();
        let outcome = processor.process(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.removed_links.len(), 1);
        assert_eq!(graph.link_count(), 0);
    }

    fn subgraph_fixture() -> (Graph, NodeId, NodeId) {
        let registry = test_registry();
        let catalog = test_catalog();

        let mut inner = Graph::new("inner");
        let input = inner.add_node_of(catalog.get("graph_input").unwrap());
        let output = inner.add_node_of(catalog.get("graph_output").unwrap());
        inner
            .connect(&registry, Anchor::slot(input, "out", 0), Anchor::slot(output, "in", 0))
            .unwrap();
        inner.set_io_nodes(Some(input), Some(output));

        let mut graph = test_graph();
        graph.add_subgraph("inner", inner);
        let a = graph.spawn("source").unwrap();
        let id = graph.allocate_node_id();
        let external = Node::new(catalog.get("graph_external").unwrap(), id).with_subgraph("inner");
        let external = graph.add_node(external).unwrap();
        let b = graph.spawn("sink").unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::slot(external, "in", 0))
            .unwrap();
        graph
            .connect(&registry, Anchor::slot(external, "out", 0), Anchor::scalar(b, "in"))
            .unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_subgraph_dispatch() {
        let (mut graph, a, b) = subgraph_fixture();
        set(&mut graph, a, "out", 3.0);

        let outcome = processor().process(&mut graph);
        assert!(outcome.completed, "{:?}", outcome.error);
        assert_eq!(value(&graph, b, "in"), Some(PortValue::Float(3.0)));
        // Source, external node, both inner nodes, sink
        assert_eq!(outcome.processed_nodes, 5);
    }

    #[test]
    fn test_unknown_subgraph_runs_node_directly() {
        let registry = test_registry();
        let catalog = test_catalog();
        let mut graph = test_graph();
        let a = graph.spawn("source").unwrap();
        let id = graph.allocate_node_id();
        let external_type = catalog.get("graph_external").unwrap();
        let external = graph
            .add_node(Node::new(external_type, id).with_subgraph("missing"))
            .unwrap();
        graph
            .connect(&registry, Anchor::scalar(a, "out"), Anchor::slot(external, "in", 0))
            .unwrap();
        set(&mut graph, a, "out", 3.0);

        let outcome = processor().process(&mut graph);
        assert!(outcome.completed);
        assert_eq!(outcome.processed_nodes, 2);
        let slots = graph.node(external).unwrap().fields().array("in").unwrap();
        assert_eq!(slots.at(0).unwrap(), Some(&PortValue::Float(3.0)));
        assert!(matches!(
            graph.node(external).unwrap().fields().get("out"),
            Some(PortField::Array(Some(_)))
        ));
    }
}
