// SPDX-License-Identifier: MIT OR Apache-2.0
//! Moving values along links.
//!
//! A link either addresses whole ports or single slots of array ports at
//! each end. Slot writes are forced: the previous value and source tag are
//! replaced. Array ports are never resized by propagation.

use crate::error::{FieldError, ProcessError, SlotError};
use crate::graph::Graph;
use crate::link::{Link, LinkTopology};
use crate::node::NodeId;
use crate::port::{PortField, PortKind, PortValue};
use crate::registry::PortRegistry;
use crate::slots::SlotArray;
use std::collections::HashSet;

/// Propagates values along the links of one graph
pub struct LinkPropagator<'a> {
    registry: &'a PortRegistry,
    node_table: Option<&'a HashSet<NodeId>>,
    real_mode: bool,
}

impl<'a> LinkPropagator<'a> {
    /// Create a propagator; integrity checks run unless `real_mode` is set
    pub fn new(registry: &'a PortRegistry, real_mode: bool) -> Self {
        Self {
            registry,
            node_table: None,
            real_mode,
        }
    }

    /// Restrict live destinations to the given ids
    pub fn with_node_table(mut self, node_table: Option<&'a HashSet<NodeId>>) -> Self {
        self.node_table = node_table;
        self
    }

    /// Move the value at the source of `link` to its destination
    pub fn propagate(&self, link: &Link, graph: &mut Graph) -> Result<(), ProcessError> {
        if !self.real_mode {
            self.check_integrity(link, graph)?;
        }

        let source = graph.node(link.from.node).ok_or(ProcessError::DanglingNode {
            link: link.id,
            node: link.from.node,
        })?;
        let from_port = self.registry.lookup(&source.node_type, &link.from.port)?;
        let value = from_port
            .get(source)
            .ok_or_else(|| unknown_port(&source.node_type, &link.from.port))?
            .clone();

        // Reading a slot out of a missing array is a no-op
        if link.from.is_slot() && value.is_null() {
            return Ok(());
        }

        let target = graph.node_mut(link.to.node).ok_or(ProcessError::DanglingNode {
            link: link.id,
            node: link.to.node,
        })?;
        let to_port = self.registry.lookup(&target.node_type, &link.to.port)?;
        let node_type = target.node_type.clone();
        let field = to_port
            .get_mut(target)
            .ok_or_else(|| unknown_port(&node_type, &link.to.port))?;

        write(link, value, field)
    }

    fn check_integrity(&self, link: &Link, graph: &Graph) -> Result<(), ProcessError> {
        let dangling = ProcessError::DanglingNode {
            link: link.id,
            node: link.to.node,
        };
        if let Some(table) = self.node_table {
            if !table.contains(&link.to.node) {
                tracing::error!("Node id ({}) not found in nodes table", link.to.node);
                return Err(dangling);
            }
        }
        let Some(target) = graph.node(link.to.node) else {
            tracing::error!("Node id ({}) is null in nodes table", link.to.node);
            return Err(dangling);
        };
        let Some(source) = graph.node(link.from.node) else {
            return Err(ProcessError::DanglingNode {
                link: link.id,
                node: link.from.node,
            });
        };

        let from_port = self.registry.lookup(&source.node_type, &link.from.port)?;
        self.registry.lookup(&target.node_type, &link.to.port)?;

        let is_null = from_port.get(source).map_or(true, PortField::is_null);
        if is_null {
            return Err(ProcessError::NullSourceValue {
                node: source.id,
                port: link.from.port.clone(),
            });
        }

        Ok(())
    }
}

fn unknown_port(node_type: &str, port: &str) -> ProcessError {
    ProcessError::UnknownPort {
        node_type: node_type.to_string(),
        port: port.to_string(),
    }
}

fn write(link: &Link, value: PortField, field: &mut PortField) -> Result<(), ProcessError> {
    match link.topology() {
        LinkTopology::ScalarToScalar => assign_field(link, field, value),
        LinkTopology::ScalarToSlot => {
            let PortField::Scalar(value) = value else {
                return Err(ProcessError::FieldWrite {
                    port: link.to.port.clone(),
                    source: FieldError::KindMismatch {
                        expected: PortKind::Scalar,
                        found: PortKind::Array,
                    },
                });
            };
            assign_slot(link, field, value)
        }
        LinkTopology::SlotToScalar => {
            let value = read_slot(link, &value)?;
            assign_field(link, field, PortField::Scalar(value))
        }
        LinkTopology::SlotToSlot => {
            let value = read_slot(link, &value)?;
            assign_slot(link, field, value)
        }
    }
}

fn assign_field(link: &Link, field: &mut PortField, value: PortField) -> Result<(), ProcessError> {
    field.assign(value).map_err(|source| ProcessError::FieldWrite {
        port: link.to.port.clone(),
        source,
    })
}

fn read_slot(link: &Link, value: &PortField) -> Result<Option<PortValue>, ProcessError> {
    let index = link.from.index.unwrap_or_default();
    let array: Result<&SlotArray, SlotError> = match value {
        PortField::Array(Some(array)) => Ok(array),
        PortField::Array(None) => Err(SlotError::NullArray),
        PortField::Scalar(_) => Err(SlotError::NotAnArray),
    };
    array
        .and_then(|array| array.at(index))
        .map(Option::<&PortValue>::cloned)
        .map_err(|source| ProcessError::SlotRead {
            port: link.from.port.clone(),
            index,
            source,
        })
}

fn assign_slot(
    link: &Link,
    field: &mut PortField,
    value: Option<PortValue>,
) -> Result<(), ProcessError> {
    let index = link.to.index.unwrap_or_default();
    let result = match field {
        PortField::Array(Some(array)) => {
            array.assign_at(index, value, link.from.port.as_str(), true)
        }
        PortField::Array(None) => Err(SlotError::NullArray),
        PortField::Scalar(_) => Err(SlotError::NotAnArray),
    };
    result.map_err(|source| ProcessError::SlotAssignment {
        port: link.to.port.clone(),
        index,
        source,
    })
}
