// SPDX-License-Identifier: MIT OR Apache-2.0
//! Link (edge) definitions for the graph.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId(pub Uuid);

impl LinkId {
    /// Create a new random link ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LinkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One end of a link: a node, one of its ports, and optionally a slot of that port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Anchor {
    /// Node ID
    pub node: NodeId,
    /// Port name
    pub port: String,
    /// Slot index for array ports, `None` to use the whole port
    pub index: Option<usize>,
}

impl Anchor {
    /// Anchor on a whole port
    pub fn scalar(node: NodeId, port: impl Into<String>) -> Self {
        Self {
            node,
            port: port.into(),
            index: None,
        }
    }

    /// Anchor on one slot of an array port
    pub fn slot(node: NodeId, port: impl Into<String>, index: usize) -> Self {
        Self {
            node,
            port: port.into(),
            index: Some(index),
        }
    }

    /// Whether this anchor addresses a slot
    pub fn is_slot(&self) -> bool {
        self.index.is_some()
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}.{}[{}]", self.node, self.port, index),
            None => write!(f, "{}.{}", self.node, self.port),
        }
    }
}

/// How values move along a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTopology {
    /// Whole port to whole port
    ScalarToScalar,
    /// Whole port into one slot
    ScalarToSlot,
    /// One slot into a whole port
    SlotToScalar,
    /// One slot into another slot
    SlotToSlot,
}

/// A directed link between two anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link ID
    pub id: LinkId,
    /// Source anchor (an output)
    pub from: Anchor,
    /// Destination anchor (an input)
    pub to: Anchor,
}

impl Link {
    /// Create a new link
    pub fn new(from: Anchor, to: Anchor) -> Self {
        Self {
            id: LinkId::new(),
            from,
            to,
        }
    }

    /// Classify the link by which ends address slots
    pub fn topology(&self) -> LinkTopology {
        match (self.from.is_slot(), self.to.is_slot()) {
            (false, false) => LinkTopology::ScalarToScalar,
            (false, true) => LinkTopology::ScalarToSlot,
            (true, false) => LinkTopology::SlotToScalar,
            (true, true) => LinkTopology::SlotToSlot,
        }
    }

    /// Check if this link involves a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.from.node == node_id || self.to.node == node_id
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
