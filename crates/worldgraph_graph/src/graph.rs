// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes, their links and subgraphs.

use crate::config::GraphSettings;
use crate::link::{Anchor, Link, LinkId};
use crate::node::{Node, NodeId, NodeType};
use crate::port::{PortDirection, PortKind};
use crate::registry::PortRegistry;
use crate::scheduler::{self, ComputeEntry, CycleError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Port through which an external-graph node feeds its subgraph
pub const SUBGRAPH_INPUT_PORT: &str = "in";
/// Port through which a subgraph reports back to its external-graph node
pub const SUBGRAPH_OUTPUT_PORT: &str = "out";

/// How a graph is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphMode {
    /// Fail-fast, unchecked execution
    Real,
    /// Validating, self-healing, profiled execution
    #[default]
    Interactive,
}

/// Change notification queued for the host
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// A node was added
    NodeAdded(NodeId),
    /// A node was removed
    NodeRemoved(NodeId),
    /// A link was added
    LinkAdded(LinkId),
    /// A link was removed
    LinkRemoved(Link),
}

/// A node graph
#[derive(Debug, Default)]
pub struct Graph {
    /// Graph name
    pub name: String,
    mode: GraphMode,
    settings: GraphSettings,
    nodes: IndexMap<NodeId, Node>,
    next_node_id: u32,
    compute_order: Option<Vec<ComputeEntry>>,
    subgraphs: IndexMap<String, Graph>,
    input_node: Option<NodeId>,
    output_node: Option<NodeId>,
    events: Vec<GraphEvent>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the execution mode
    pub fn with_mode(mut self, mode: GraphMode) -> Self {
        self.mode = mode;
        self
    }

    /// Execution mode
    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    /// Change the execution mode
    pub fn set_mode(&mut self, mode: GraphMode) {
        self.mode = mode;
    }

    /// Whether the graph runs fail-fast
    pub fn is_real_mode(&self) -> bool {
        self.mode == GraphMode::Real
    }

    /// Generation settings
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Reserve a fresh node ID, skipping IDs already in use
    pub fn allocate_node_id(&mut self) -> NodeId {
        while self.nodes.contains_key(&NodeId(self.next_node_id)) {
            self.next_node_id = self.next_node_id.wrapping_add(1);
        }
        let id = NodeId(self.next_node_id);
        self.next_node_id = self.next_node_id.wrapping_add(1);
        id
    }

    /// Add a node to the graph.
    ///
    /// Returns `None` and leaves the graph untouched if the ID is taken.
    pub fn add_node(&mut self, node: Node) -> Option<NodeId> {
        if self.nodes.contains_key(&node.id) {
            tracing::warn!("Graph `{}` already has a node {}", self.name, node.id);
            return None;
        }
        self.next_node_id = self.next_node_id.max(node.id.0.saturating_add(1));
        Some(self.insert_node(node))
    }

    /// Instantiate a node type with a fresh ID and add it
    pub fn add_node_of(&mut self, node_type: &NodeType) -> NodeId {
        let id = self.allocate_node_id();
        self.insert_node(Node::new(node_type, id))
    }

    fn insert_node(&mut self, mut node: Node) -> NodeId {
        let id = node.id;
        node.settings = self.settings.clone();
        self.nodes.insert(id, node);
        self.invalidate_compute_order();
        self.events.push(GraphEvent::NodeAdded(id));
        id
    }

    /// Remove a node and every link touching it
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<Node> {
        let node = self.nodes.shift_remove(&node_id)?;
        for other in self.nodes.values_mut() {
            other.retain_links(|l| l.to.node != node_id);
        }
        if self.input_node == Some(node_id) {
            self.input_node = None;
        }
        if self.output_node == Some(node_id) {
            self.output_node = None;
        }
        self.invalidate_compute_order();
        self.events.push(GraphEvent::NodeRemoved(node_id));
        Some(node)
    }

    /// Get a node by ID
    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.get(&node_id)
    }

    /// Get a mutable node by ID
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&node_id)
    }

    /// Whether a node is present
    pub fn contains_node(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Link two anchors after validating them against the port tables
    pub fn connect(
        &mut self,
        registry: &PortRegistry,
        from: Anchor,
        to: Anchor,
    ) -> Result<LinkId, LinkError> {
        if from.node == to.node {
            return Err(LinkError::SelfLoop);
        }

        let source_node = self.nodes.get(&from.node).ok_or(LinkError::NodeNotFound(from.node))?;
        let target_node = self.nodes.get(&to.node).ok_or(LinkError::NodeNotFound(to.node))?;

        let source_port = registry
            .lookup(&source_node.node_type, &from.port)
            .map_err(|_| LinkError::UnknownPort(from.port.clone()))?;
        let target_port = registry
            .lookup(&target_node.node_type, &to.port)
            .map_err(|_| LinkError::UnknownPort(to.port.clone()))?;

        if source_port.direction != PortDirection::Output
            || target_port.direction != PortDirection::Input
        {
            return Err(LinkError::WrongDirection);
        }

        if !source_port.port_type.can_connect_to(&target_port.port_type) {
            return Err(LinkError::IncompatibleTypes);
        }

        for (anchor, kind) in [(&from, source_port.kind), (&to, target_port.kind)] {
            if anchor.is_slot() && kind != PortKind::Array {
                return Err(LinkError::SlotKindMismatch(anchor.port.clone()));
            }
        }

        // A scalar input, or one slot of an array input, takes a single link
        if !target_port.multi_connect && self.links().any(|l| l.to == to) {
            return Err(LinkError::AlreadyConnected(to.to_string()));
        }

        let link = Link::new(from, to);
        let id = link.id;
        self.insert_link(link);
        Ok(id)
    }

    /// Store a link without validation.
    ///
    /// The destination may be missing; interactive passes drop such links.
    /// Returns `None` if the source node is absent.
    pub fn insert_link(&mut self, link: Link) -> Option<LinkId> {
        let id = link.id;
        self.nodes.get_mut(&link.from.node)?.push_link(link);
        self.invalidate_compute_order();
        self.events.push(GraphEvent::LinkAdded(id));
        Some(id)
    }

    /// Remove a link, queueing a `LinkRemoved` event when `notify` is set
    pub fn remove_link(&mut self, link_id: LinkId, notify: bool) -> Option<Link> {
        let link = self.nodes.values_mut().find_map(|n| n.take_link(link_id))?;
        self.invalidate_compute_order();
        if notify {
            self.events.push(GraphEvent::LinkRemoved(link.clone()));
        }
        Some(link)
    }

    /// Get a link by ID
    pub fn link(&self, link_id: LinkId) -> Option<&Link> {
        self.links().find(|l| l.id == link_id)
    }

    /// Get all links
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.nodes.values().flat_map(Node::outgoing_links)
    }

    /// Get links arriving at a node
    pub fn incoming_links(&self, node_id: NodeId) -> impl Iterator<Item = &Link> {
        self.links().filter(move |l| l.to.node == node_id)
    }

    /// Get the number of links
    pub fn link_count(&self) -> usize {
        self.nodes.values().map(|n| n.outgoing_links().len()).sum()
    }

    /// Drain queued change notifications
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Compute order
    // ------------------------------------------------------------------

    /// Cached compute order, if still valid
    pub fn compute_sorted_nodes(&self) -> Option<&[ComputeEntry]> {
        self.compute_order.as_deref()
    }

    /// Recompute the order and store each node's rank
    pub fn update_compute_order(&mut self) -> Result<(), CycleError> {
        let order = scheduler::compute_order(self)?;
        for entry in &order {
            if let Some(node) = self.nodes.get_mut(&entry.node) {
                node.compute_rank = entry.rank;
            }
        }
        self.compute_order = Some(order);
        Ok(())
    }

    /// Forget the cached order
    pub fn invalidate_compute_order(&mut self) {
        self.compute_order = None;
    }

    // ------------------------------------------------------------------
    // Subgraphs
    // ------------------------------------------------------------------

    /// Embed a subgraph under `name`
    pub fn add_subgraph(&mut self, name: impl Into<String>, graph: Graph) {
        self.subgraphs.insert(name.into(), graph);
        self.invalidate_compute_order();
    }

    /// Get a subgraph by name
    pub fn subgraph(&self, name: &str) -> Option<&Graph> {
        self.subgraphs.get(name)
    }

    /// Get a mutable subgraph by name
    pub fn subgraph_mut(&mut self, name: &str) -> Option<&mut Graph> {
        self.subgraphs.get_mut(name)
    }

    /// Names of the embedded subgraphs
    pub fn subgraph_names(&self) -> impl Iterator<Item = &str> {
        self.subgraphs.keys().map(String::as_str)
    }

    /// Designate the nodes that receive and report subgraph values
    pub fn set_io_nodes(&mut self, input: Option<NodeId>, output: Option<NodeId>) {
        self.input_node = input;
        self.output_node = output;
    }

    /// Node receiving values from the external-graph node
    pub fn input_node(&self) -> Option<NodeId> {
        self.input_node
    }

    /// Node whose values are reported to the external-graph node
    pub fn output_node(&self) -> Option<NodeId> {
        self.output_node
    }

    // ------------------------------------------------------------------
    // Generation settings
    // ------------------------------------------------------------------

    /// Visit every node, optionally descending into subgraphs
    pub fn for_each_node_mut(&mut self, recursive: bool, f: &mut dyn FnMut(&mut Node)) {
        for node in self.nodes.values_mut() {
            f(node);
        }
        if recursive {
            for subgraph in self.subgraphs.values_mut() {
                subgraph.for_each_node_mut(true, f);
            }
        }
    }

    /// Change the seed of this graph, its subgraphs and all their nodes
    pub fn update_seed(&mut self, seed: i32) {
        self.settings.seed = seed;
        for subgraph in self.subgraphs.values_mut() {
            subgraph.update_seed(seed);
        }
        for node in self.nodes.values_mut() {
            node.settings.seed = seed;
        }
    }

    /// Change the chunk size everywhere
    pub fn update_chunk_size(&mut self, chunk_size: u32) {
        self.settings.chunk_size = chunk_size;
        for subgraph in self.subgraphs.values_mut() {
            subgraph.update_chunk_size(chunk_size);
        }
        for node in self.nodes.values_mut() {
            node.settings.chunk_size = chunk_size;
        }
    }

    /// Change the chunk position everywhere
    pub fn update_chunk_position(&mut self, chunk_position: [f32; 3]) {
        self.settings.chunk_position = chunk_position;
        for subgraph in self.subgraphs.values_mut() {
            subgraph.update_chunk_position(chunk_position);
        }
        for node in self.nodes.values_mut() {
            node.settings.chunk_position = chunk_position;
        }
    }

    /// Apply a full set of generation settings
    pub fn apply_settings(&mut self, settings: &GraphSettings) {
        self.update_seed(settings.seed);
        self.update_chunk_size(settings.chunk_size);
        self.update_chunk_position(settings.chunk_position);
    }
}

/// Error when creating a link
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Port not found
    #[error("Port not found: {0}")]
    UnknownPort(String),

    /// Links must go from an output to an input
    #[error("Links must go from an output to an input")]
    WrongDirection,

    /// Incompatible port types
    #[error("Incompatible port types")]
    IncompatibleTypes,

    /// A slot index was given for a scalar port
    #[error("Port `{0}` is not an array")]
    SlotKindMismatch(String),

    /// Input is already connected
    #[error("Input already connected: {0}")]
    AlreadyConnected(String),

    /// Self-loop not allowed
    #[error("Self-loop not allowed")]
    SelfLoop,
}
