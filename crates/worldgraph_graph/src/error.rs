// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph processing.

use crate::link::LinkId;
use crate::node::NodeId;
use crate::port::{PortKind, PortType};
use crate::scheduler::CycleError;
use thiserror::Error;

/// Error raised while executing a pass
#[derive(Debug, Error)]
pub enum ProcessError {
    /// A link references a port that is not registered for the node's type
    #[error("Unknown port `{port}` on node type `{node_type}`")]
    UnknownPort {
        /// Node type key
        node_type: String,
        /// Port name
        port: String,
    },

    /// A link endpoint is missing from the live node table
    #[error("Node {node} of link {link} not found in node table")]
    DanglingNode {
        /// The offending link
        link: LinkId,
        /// The missing node
        node: NodeId,
    },

    /// The source port holds no value
    #[error("Null value on {node}.{port}")]
    NullSourceValue {
        /// Source node
        node: NodeId,
        /// Source port
        port: String,
    },

    /// Writing into an addressed slot failed
    #[error("Failed to set indexed field value {port}[{index}]: {source}")]
    SlotAssignment {
        /// Destination port
        port: String,
        /// Destination slot
        index: usize,
        /// Underlying slot error
        #[source]
        source: SlotError,
    },

    /// Reading an addressed slot failed
    #[error("Failed to read indexed field value {port}[{index}]: {source}")]
    SlotRead {
        /// Source port
        port: String,
        /// Source slot
        index: usize,
        /// Underlying slot error
        #[source]
        source: SlotError,
    },

    /// Writing a whole field failed
    #[error("Failed to set field `{port}`: {source}")]
    FieldWrite {
        /// Destination port
        port: String,
        /// Underlying field error
        #[source]
        source: FieldError,
    },

    /// A node's own computation failed
    #[error("Node {node} failed: {source}")]
    NodeComputation {
        /// The failing node
        node: NodeId,
        /// Error returned by the node body
        #[source]
        source: NodeError,
    },

    /// No valid execution order exists
    #[error(transparent)]
    CyclicGraph(#[from] CycleError),

    /// A nested subgraph pass failed
    #[error("Subgraph `{name}` failed: {source}")]
    Subgraph {
        /// Subgraph name
        name: String,
        /// Error that aborted the nested pass
        #[source]
        source: Box<ProcessError>,
    },
}

impl ProcessError {
    /// Whether interactive mode may log this error and keep going
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::NodeComputation { .. } | Self::CyclicGraph(_) | Self::Subgraph { .. }
        )
    }

    /// Whether interactive mode should drop the link that raised this error
    pub fn removes_link(&self) -> bool {
        matches!(self, Self::UnknownPort { .. } | Self::DanglingNode { .. })
    }
}

/// Error returned by a node body
#[derive(Debug, Error)]
pub enum NodeError {
    /// Missing required input
    #[error("Missing required input: {0}")]
    MissingInput(String),

    /// Type mismatch
    #[error("Type mismatch on `{port}`: expected {expected}, found {found}")]
    TypeMismatch {
        /// Port name
        port: String,
        /// Expected type
        expected: PortType,
        /// Actual type
        found: PortType,
    },

    /// Field access failed
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Custom error
    #[error("{0}")]
    Custom(String),
}

/// Error when accessing a node field
#[derive(Debug, Error)]
pub enum FieldError {
    /// No field with this name
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The field has a different kind
    #[error("Field kind mismatch: expected {expected:?}, found {found:?}")]
    KindMismatch {
        /// Declared kind
        expected: PortKind,
        /// Kind of the written value
        found: PortKind,
    },
}

/// Error when accessing a slot array
#[derive(Debug, Error)]
pub enum SlotError {
    /// Index outside the current slot count
    #[error("Index {index} out of bounds (len {len})")]
    OutOfBounds {
        /// Requested index
        index: usize,
        /// Current slot count
        len: usize,
    },

    /// Slot already holds a value and the write was not forced
    #[error("Slot {0} is already occupied")]
    Occupied(usize),

    /// Value type does not match the array element type
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Element type
        expected: PortType,
        /// Value type
        found: PortType,
    },

    /// The array port holds no array
    #[error("Array is not set")]
    NullArray,

    /// The field is not an array
    #[error("Field is not an array")]
    NotAnArray,
}
