// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions: types, instances and the catalog of available types.

use crate::config::GraphSettings;
use crate::error::{FieldError, NodeError};
use crate::link::{Link, LinkId};
use crate::port::{Port, PortField, PortKind, PortValue};
use crate::slots::SlotArray;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Compute rank of a node that takes no part in execution
pub const EXCLUDED_RANK: i32 = -1;

/// Unique identifier for a node within its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Node type category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeCategory {
    /// Input nodes (constants, parameters)
    Input,
    /// Output nodes (result, preview)
    Output,
    /// Math operations
    Math,
    /// Subgraph plumbing
    Graph,
    /// Debugging helpers
    Debug,
    /// Custom/user-defined
    Custom,
}

/// Computation attached to a node.
///
/// The engine only decides when this runs; what it computes is up to the node.
pub trait NodeBehavior: fmt::Debug + Send {
    /// Regular computation, run on every pass
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError>;

    /// One-shot initialization, run by a once pass instead of `process`
    fn process_once(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let _ = ctx;
        Ok(())
    }
}

/// Behavior for nodes that only hold values
#[derive(Debug, Default)]
pub struct NoopBehavior;

impl NodeBehavior for NoopBehavior {
    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }
}

/// What a node body can see while it runs
pub struct ProcessContext<'a> {
    /// The running node
    pub node_id: NodeId,
    /// Generation settings of the node
    pub settings: &'a GraphSettings,
    /// Port fields of the node
    pub fields: &'a mut NodeFields,
    /// Non-port properties of the node
    pub properties: &'a IndexMap<String, PortValue>,
}

impl ProcessContext<'_> {
    /// Read a property
    pub fn property(&self, name: &str) -> Option<&PortValue> {
        self.properties.get(name)
    }
}

/// Node type definition
#[derive(Debug, Clone)]
pub struct NodeType {
    /// Unique type identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Category
    pub category: NodeCategory,
    /// Description
    pub description: String,
    /// Input ports
    pub inputs: Vec<Port>,
    /// Output ports
    pub outputs: Vec<Port>,
    /// Editable settings that are not ports
    pub properties: IndexMap<String, PortValue>,
    /// Creates the computation of a fresh instance
    pub behavior: fn() -> Box<dyn NodeBehavior>,
}

impl NodeType {
    /// Create a node type with no ports and no computation
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            properties: IndexMap::new(),
            behavior: || Box::new(NoopBehavior),
        }
    }

    /// Get all declared ports, inputs first
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Get a port by name
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports().find(|p| p.name == name)
    }
}

/// The port fields of one node instance, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFields {
    fields: IndexMap<String, PortField>,
}

impl NodeFields {
    /// Build fresh fields for the given ports
    pub fn from_ports<'p>(ports: impl IntoIterator<Item = &'p Port>) -> Self {
        Self {
            fields: ports
                .into_iter()
                .map(|port| (port.name.clone(), port.initial_field()))
                .collect(),
        }
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&PortField> {
        self.fields.get(name)
    }

    /// Get a mutable field by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut PortField> {
        self.fields.get_mut(name)
    }

    /// Get a field by declaration index
    pub fn get_index(&self, index: usize) -> Option<(&str, &PortField)> {
        self.fields.get_index(index).map(|(k, v)| (k.as_str(), v))
    }

    /// Get a mutable field by declaration index
    pub fn get_index_mut(&mut self, index: usize) -> Option<(&str, &mut PortField)> {
        self.fields.get_index_mut(index).map(|(k, v)| (k.as_str(), v))
    }

    /// Scalar value of a field
    pub fn value(&self, name: &str) -> Option<&PortValue> {
        self.fields.get(name).and_then(PortField::value)
    }

    /// Set the value of a scalar field
    pub fn set_value(&mut self, name: &str, value: impl Into<PortValue>) -> Result<(), FieldError> {
        self.set_field(name, PortField::Scalar(Some(value.into())))
    }

    /// Unset a scalar field
    pub fn clear_value(&mut self, name: &str) -> Result<(), FieldError> {
        self.set_field(name, PortField::Scalar(None))
    }

    /// Replace a whole field. The kind may not change.
    pub fn set_field(&mut self, name: &str, field: PortField) -> Result<(), FieldError> {
        self.fields
            .get_mut(name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()))?
            .assign(field)
    }

    /// Slot array of an array field
    pub fn array(&self, name: &str) -> Option<&SlotArray> {
        self.fields.get(name).and_then(PortField::array)
    }

    /// Mutable slot array of an array field
    pub fn array_mut(&mut self, name: &str) -> Option<&mut SlotArray> {
        self.fields.get_mut(name).and_then(PortField::array_mut)
    }

    /// Kind of a field
    pub fn kind(&self, name: &str) -> Option<PortKind> {
        self.fields.get(name).map(PortField::kind)
    }

    /// Field names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the node has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A node instance in the graph
#[derive(Debug)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Node type ID
    pub node_type: String,
    /// Display name (can be customized)
    pub name: String,
    /// Position in the graph UI
    pub position: [f32; 2],
    /// Position in the execution order, `EXCLUDED_RANK` when not executed
    pub compute_rank: i32,
    /// Duration of the last invocation, measured in interactive mode
    pub last_process_duration: Option<Duration>,
    /// Generation settings pushed down from the graph
    pub settings: GraphSettings,
    fields: NodeFields,
    properties: IndexMap<String, PortValue>,
    outgoing: Vec<Link>,
    subgraph: Option<String>,
    behavior: Box<dyn NodeBehavior>,
}

impl Node {
    /// Create a new node from a type definition
    pub fn new(node_type: &NodeType, id: NodeId) -> Self {
        Self {
            id,
            node_type: node_type.id.clone(),
            name: node_type.name.clone(),
            position: [0.0, 0.0],
            compute_rank: EXCLUDED_RANK,
            last_process_duration: None,
            settings: GraphSettings::default(),
            fields: NodeFields::from_ports(node_type.ports()),
            properties: node_type.properties.clone(),
            outgoing: Vec::new(),
            subgraph: None,
            behavior: (node_type.behavior)(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Make this node stand for the named subgraph
    pub fn with_subgraph(mut self, name: impl Into<String>) -> Self {
        self.subgraph = Some(name.into());
        self
    }

    /// Name of the subgraph this node stands for
    pub fn subgraph(&self) -> Option<&str> {
        self.subgraph.as_deref()
    }

    /// Port fields
    pub fn fields(&self) -> &NodeFields {
        &self.fields
    }

    /// Mutable port fields
    pub fn fields_mut(&mut self) -> &mut NodeFields {
        &mut self.fields
    }

    /// Get a property
    pub fn property(&self, name: &str) -> Option<&PortValue> {
        self.properties.get(name)
    }

    /// Set a property
    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<PortValue>) {
        self.properties.insert(name.into(), value.into());
    }

    /// Links leaving this node
    pub fn outgoing_links(&self) -> &[Link] {
        &self.outgoing
    }

    /// Whether this node takes part in execution
    pub fn is_scheduled(&self) -> bool {
        self.compute_rank >= 0
    }

    /// Run the regular computation
    pub fn process(&mut self) -> Result<(), NodeError> {
        let mut ctx = ProcessContext {
            node_id: self.id,
            settings: &self.settings,
            fields: &mut self.fields,
            properties: &self.properties,
        };
        self.behavior.process(&mut ctx)
    }

    /// Run the one-shot initialization
    pub fn process_once(&mut self) -> Result<(), NodeError> {
        let mut ctx = ProcessContext {
            node_id: self.id,
            settings: &self.settings,
            fields: &mut self.fields,
            properties: &self.properties,
        };
        self.behavior.process_once(&mut ctx)
    }

    pub(crate) fn push_link(&mut self, link: Link) {
        self.outgoing.push(link);
    }

    pub(crate) fn take_link(&mut self, link_id: LinkId) -> Option<Link> {
        let index = self.outgoing.iter().position(|l| l.id == link_id)?;
        Some(self.outgoing.remove(index))
    }

    pub(crate) fn retain_links(&mut self, keep: impl FnMut(&Link) -> bool) -> usize {
        let before = self.outgoing.len();
        self.outgoing.retain(keep);
        before - self.outgoing.len()
    }
}

/// Source of node types, consulted whenever port tables are rebuilt
pub trait NodeTypeCatalog {
    /// Every node type currently available
    fn all_node_types(&self) -> Vec<&NodeType>;
}

/// Catalog of available node types
pub struct NodeCatalog {
    types: IndexMap<String, NodeType>,
}

impl NodeCatalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            types: IndexMap::new(),
        }
    }

    /// Register a node type
    pub fn register(&mut self, node_type: NodeType) {
        self.types.insert(node_type.id.clone(), node_type);
    }

    /// Get a node type by ID
    pub fn get(&self, id: &str) -> Option<&NodeType> {
        self.types.get(id)
    }

    /// Get all registered types
    pub fn types(&self) -> impl Iterator<Item = &NodeType> {
        self.types.values()
    }

    /// Get types by category
    pub fn types_in_category(&self, category: NodeCategory) -> impl Iterator<Item = &NodeType> {
        self.types.values().filter(move |t| t.category == category)
    }

    /// Create a node from a type ID
    pub fn create_node(&self, type_id: &str, id: NodeId) -> Option<Node> {
        self.get(type_id).map(|t| Node::new(t, id))
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for NodeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeTypeCatalog for NodeCatalog {
    fn all_node_types(&self) -> Vec<&NodeType> {
        self.types.values().collect()
    }
}
