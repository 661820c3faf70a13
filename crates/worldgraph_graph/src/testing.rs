// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node types and helpers shared by the unit tests.

use crate::builtin::create_builtin_catalog;
use crate::error::NodeError;
use crate::graph::Graph;
use crate::node::{NodeBehavior, NodeCatalog, NodeCategory, NodeId, NodeType, ProcessContext};
use crate::port::{Port, PortType, PortValue};
use crate::registry::{PortRegistry, SharedPortRegistry};

#[derive(Debug)]
struct Relay;

impl NodeBehavior for Relay {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        match ctx.fields.value("in").cloned() {
            Some(value) => ctx.fields.set_value("out", value)?,
            None => ctx.fields.clear_value("out")?,
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Failing;

impl NodeBehavior for Failing {
    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Err(NodeError::Custom("boom".into()))
    }
}

#[derive(Debug, Default)]
struct Counter {
    runs: i32,
}

impl NodeBehavior for Counter {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        self.runs += 1;
        ctx.fields.set_value("count", self.runs)?;
        Ok(())
    }

    fn process_once(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        ctx.fields.set_value("count", 100)?;
        Ok(())
    }
}

/// Built-in types plus the small types the tests wire together
pub(crate) fn test_catalog() -> NodeCatalog {
    let mut catalog = create_builtin_catalog();

    let mut source = NodeType::new("source", "Source", NodeCategory::Input);
    source.outputs.push(Port::output("out", PortType::Float));
    catalog.register(source);

    let mut sink = NodeType::new("sink", "Sink", NodeCategory::Output);
    sink.inputs.push(Port::input("in", PortType::Float));
    catalog.register(sink);

    let mut relay = NodeType::new("relay", "Relay", NodeCategory::Custom);
    relay.inputs.push(Port::input("in", PortType::Float));
    relay.outputs.push(Port::output("out", PortType::Float));
    relay.behavior = || Box::new(Relay);
    catalog.register(relay);

    let mut collector = NodeType::new("collector", "Collector", NodeCategory::Custom);
    collector.inputs.push(Port::array_input("items", PortType::Float, 3));
    collector.outputs.push(Port::array_output("outs", PortType::Float, 2));
    catalog.register(collector);

    let mut failing = NodeType::new("failing", "Failing", NodeCategory::Custom);
    failing.inputs.push(Port::input("in", PortType::Float));
    failing.outputs.push(Port::output("out", PortType::Float));
    failing.behavior = || Box::new(Failing);
    catalog.register(failing);

    let mut counter = NodeType::new("counter", "Counter", NodeCategory::Custom);
    counter.inputs.push(Port::input("in", PortType::Any));
    counter.outputs.push(Port::output("count", PortType::Int).with_default(PortValue::Int(0)));
    counter.behavior = || Box::<Counter>::default();
    catalog.register(counter);

    catalog
}

/// Port tables for `test_catalog`
pub(crate) fn test_registry() -> PortRegistry {
    PortRegistry::from_catalog(&test_catalog())
}

/// Shared port tables for `test_catalog`
pub(crate) fn test_shared_registry() -> SharedPortRegistry {
    test_registry().into_shared()
}

/// Empty interactive graph
pub(crate) fn test_graph() -> Graph {
    Graph::new("test")
}

/// Spawn test catalog nodes by type key
pub(crate) trait SpawnExt {
    /// Add a node of the given type, `None` if the type is unknown
    fn spawn(&mut self, type_id: &str) -> Option<NodeId>;
}

impl SpawnExt for Graph {
    fn spawn(&mut self, type_id: &str) -> Option<NodeId> {
        let catalog = test_catalog();
        let node_type = catalog.get(type_id)?;
        Some(self.add_node_of(node_type))
    }
}
