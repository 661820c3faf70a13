// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port lookup tables baked from the node type catalog.
//!
//! Every node type's ports are resolved once to an accessor holding the
//! field's position on a node instance, so propagation never searches a
//! node's fields by name. The tables must be rebuilt whenever the catalog
//! changes.

use crate::error::ProcessError;
use crate::node::{Node, NodeType, NodeTypeCatalog};
use crate::port::{PortDirection, PortField, PortKind, PortType};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry shared between the host and its processors
pub type SharedPortRegistry = Arc<RwLock<PortRegistry>>;

/// Resolved access to one port of a node type
#[derive(Debug, Clone, PartialEq)]
pub struct PortAccessor {
    /// Port name
    pub name: String,
    /// Position of the field on node instances
    pub index: usize,
    /// Port direction
    pub direction: PortDirection,
    /// Scalar or array
    pub kind: PortKind,
    /// Declared data type
    pub port_type: PortType,
    /// Whether several links may target the same port (or slot)
    pub multi_connect: bool,
}

impl PortAccessor {
    /// Read the field on `node`
    pub fn get<'n>(&self, node: &'n Node) -> Option<&'n PortField> {
        match node.fields().get_index(self.index) {
            Some((name, field)) if name == self.name => Some(field),
            _ => None,
        }
    }

    /// Mutable access to the field on `node`
    pub fn get_mut<'n>(&self, node: &'n mut Node) -> Option<&'n mut PortField> {
        match node.fields_mut().get_index_mut(self.index) {
            Some((name, field)) if name == self.name => Some(field),
            _ => None,
        }
    }
}

/// Port accessors for every registered node type
#[derive(Debug, Default)]
pub struct PortRegistry {
    baked: HashMap<String, IndexMap<String, PortAccessor>>,
}

impl PortRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry populated from a catalog
    pub fn from_catalog(catalog: &dyn NodeTypeCatalog) -> Self {
        let mut registry = Self::new();
        registry.rebuild(catalog);
        registry
    }

    /// Wrap into a shareable handle
    pub fn into_shared(self) -> SharedPortRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Bake the ports of one node type, replacing any previous entry
    pub fn register(&mut self, node_type: &NodeType) {
        let mut ports = IndexMap::new();

        for (index, port) in node_type.ports().enumerate() {
            let accessor = PortAccessor {
                name: port.name.clone(),
                index,
                direction: port.direction,
                kind: port.kind,
                port_type: port.port_type.clone(),
                multi_connect: port.multi_connect,
            };
            if ports.insert(port.name.clone(), accessor).is_some() {
                tracing::warn!(
                    "Node type `{}` declares port `{}` more than once",
                    node_type.id,
                    port.name
                );
            }
        }

        self.baked.insert(node_type.id.clone(), ports);
    }

    /// Clear and repopulate from the catalog
    pub fn rebuild(&mut self, catalog: &dyn NodeTypeCatalog) {
        self.baked.clear();
        for node_type in catalog.all_node_types() {
            self.register(node_type);
        }
        tracing::debug!("Baked ports for {} node types", self.baked.len());
    }

    /// Drop every table
    pub fn clear(&mut self) {
        self.baked.clear();
    }

    /// Look up a port of a node type
    pub fn lookup(&self, node_type: &str, port: &str) -> Result<&PortAccessor, ProcessError> {
        self.baked
            .get(node_type)
            .and_then(|ports| ports.get(port))
            .ok_or_else(|| ProcessError::UnknownPort {
                node_type: node_type.to_string(),
                port: port.to_string(),
            })
    }

    /// Whether a node type is registered
    pub fn contains_type(&self, node_type: &str) -> bool {
        self.baked.contains_key(node_type)
    }

    /// Ports of a node type in declaration order
    pub fn ports(&self, node_type: &str) -> impl Iterator<Item = &PortAccessor> {
        self.baked.get(node_type).into_iter().flat_map(IndexMap::values)
    }

    /// Number of registered node types
    pub fn len(&self) -> usize {
        self.baked.len()
    }

    /// Whether no node type is registered
    pub fn is_empty(&self) -> bool {
        self.baked.is_empty()
    }
}
