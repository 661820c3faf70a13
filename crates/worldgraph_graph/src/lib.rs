// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph execution engine for `WorldGraph`.
//!
//! Procedural generation pipelines are built by wiring typed nodes into a
//! directed graph. This crate decides when each node runs and how its
//! outputs reach other nodes' inputs. What a node computes is left to the
//! node types registered in a [`NodeCatalog`].
//!
//! ## Architecture
//!
//! - [`PortRegistry`] bakes the ports of every node type once
//! - [`Graph`] owns nodes, links, subgraphs and the cached compute order
//! - [`scheduler`] ranks nodes so every link goes forward
//! - [`GraphProcessor`] runs full, subset and once passes
//! - [`LinkPropagator`] moves values along scalar and slot links
//!
//! Graphs run in one of two modes. Interactive graphs check every link,
//! drop broken ones and keep going. Real graphs skip the checks and stop
//! at the first error.

pub mod builtin;
pub mod config;
pub mod error;
pub mod graph;
pub mod link;
pub mod node;
pub mod port;
pub mod processor;
pub mod propagate;
pub mod registry;
pub mod scheduler;
pub mod slots;

#[cfg(test)]
mod testing;

pub use builtin::create_builtin_catalog;
pub use config::{ConfigError, EngineConfig, GraphSettings};
pub use error::{FieldError, NodeError, ProcessError, SlotError};
pub use graph::{Graph, GraphEvent, GraphMode, LinkError};
pub use link::{Anchor, Link, LinkId};
pub use node::{Node, NodeBehavior, NodeCatalog, NodeId, NodeType, NodeTypeCatalog, ProcessContext};
pub use port::{Port, PortDirection, PortField, PortKind, PortType, PortValue};
pub use processor::{GraphProcessor, PassKind, PassOutcome};
pub use propagate::LinkPropagator;
pub use registry::{PortAccessor, PortRegistry, SharedPortRegistry};
pub use scheduler::{ComputeEntry, CycleError};
pub use slots::{Slot, SlotArray};
