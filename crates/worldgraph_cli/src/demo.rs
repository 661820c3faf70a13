// SPDX-License-Identifier: MIT OR Apache-2.0
//! Demo graph exercising scalar links, slot links and a subgraph.

use thiserror::Error;
use worldgraph_graph::{
    Anchor, Graph, GraphMode, LinkError, Node, NodeCatalog, NodeId, PortRegistry, PortValue,
};

/// Name of the embedded subgraph
pub const SCALE_SUBGRAPH: &str = "scale";

/// Error while building the demo graph
#[derive(Debug, Error)]
pub enum DemoError {
    /// The catalog lacks a node type the demo needs
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// The graph already holds a node with this id
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// A link was refused
    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Nodes of the demo graph a caller may want to inspect
#[derive(Debug, Clone, Copy)]
pub struct DemoNodes {
    /// Sum of the slider and the constant
    pub add: NodeId,
    /// Subgraph node doubling the sum
    pub external: NodeId,
    /// Logs the final value
    pub log: NodeId,
}

fn spawn(graph: &mut Graph, catalog: &NodeCatalog, type_id: &str) -> Result<NodeId, DemoError> {
    let node_type = catalog
        .get(type_id)
        .ok_or_else(|| DemoError::UnknownNodeType(type_id.to_string()))?;
    Ok(graph.add_node_of(node_type))
}

/// Subgraph feeding its first input slot twice into `add`
fn build_scale_subgraph(
    catalog: &NodeCatalog,
    registry: &PortRegistry,
    mode: GraphMode,
) -> Result<Graph, DemoError> {
    let mut graph = Graph::new(SCALE_SUBGRAPH).with_mode(mode);
    let input = spawn(&mut graph, catalog, "graph_input")?;
    let add = spawn(&mut graph, catalog, "add")?;
    let output = spawn(&mut graph, catalog, "graph_output")?;

    graph.connect(registry, Anchor::slot(input, "out", 0), Anchor::slot(add, "values", 0))?;
    graph.connect(registry, Anchor::slot(input, "out", 0), Anchor::slot(add, "values", 1))?;
    graph.connect(registry, Anchor::scalar(add, "sum"), Anchor::slot(output, "in", 0))?;
    graph.set_io_nodes(Some(input), Some(output));
    Ok(graph)
}

/// Build the demo graph: `(slider + constant) * 2`, logged
pub fn build_demo_graph(
    catalog: &NodeCatalog,
    registry: &PortRegistry,
    mode: GraphMode,
) -> Result<(Graph, DemoNodes), DemoError> {
    let mut graph = Graph::new("demo").with_mode(mode);
    graph.add_subgraph(SCALE_SUBGRAPH, build_scale_subgraph(catalog, registry, mode)?);

    let slider = spawn(&mut graph, catalog, "slider")?;
    let constant = spawn(&mut graph, catalog, "constant")?;
    let add = spawn(&mut graph, catalog, "add")?;
    let log = spawn(&mut graph, catalog, "debug_log")?;

    let external_type = catalog
        .get("graph_external")
        .ok_or_else(|| DemoError::UnknownNodeType("graph_external".into()))?;
    let id = graph.allocate_node_id();
    let external = graph
        .add_node(
            Node::new(external_type, id)
                .with_subgraph(SCALE_SUBGRAPH)
                .with_position(300.0, 0.0),
        )
        .ok_or(DemoError::DuplicateNode(id))?;

    if let Some(node) = graph.node_mut(slider) {
        node.set_property("value", 0.25f32);
    }
    if let Some(node) = graph.node_mut(constant) {
        node.set_property("value", PortValue::Float(2.0));
    }

    graph.connect(registry, Anchor::scalar(slider, "value"), Anchor::slot(add, "values", 0))?;
    graph.connect(registry, Anchor::scalar(constant, "value"), Anchor::slot(add, "values", 1))?;
    graph.connect(registry, Anchor::scalar(add, "sum"), Anchor::slot(external, "in", 0))?;
    graph.connect(registry, Anchor::slot(external, "out", 0), Anchor::scalar(log, "value"))?;

    Ok((graph, DemoNodes { add, external, log }))
}
