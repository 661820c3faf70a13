// SPDX-License-Identifier: MIT OR Apache-2.0
//! Generic node types shipped with the engine.

use crate::error::NodeError;
use crate::graph::{SUBGRAPH_INPUT_PORT, SUBGRAPH_OUTPUT_PORT};
use crate::node::{NodeBehavior, NodeCatalog, NodeCategory, NodeType, ProcessContext};
use crate::port::{Port, PortType, PortValue};

/// Slot count of the subgraph plumbing arrays
pub const GRAPH_IO_SLOTS: usize = 4;

/// Slot count of the `add` node's operand array
pub const ADD_OPERAND_SLOTS: usize = 4;

/// Create a catalog holding every built-in node type
pub fn create_builtin_catalog() -> NodeCatalog {
    let mut catalog = NodeCatalog::new();

    // Input nodes
    catalog.register(slider_type());
    catalog.register(constant_type());

    // Math
    catalog.register(add_type());

    // Debug
    catalog.register(debug_log_type());

    // Subgraph plumbing
    let mut input = NodeType::new("graph_input", "Graph Input", NodeCategory::Graph);
    input.description = "Values handed to a subgraph".into();
    input.outputs.push(Port::array_output(SUBGRAPH_OUTPUT_PORT, PortType::Any, GRAPH_IO_SLOTS));
    catalog.register(input);

    let mut output = NodeType::new("graph_output", "Graph Output", NodeCategory::Graph);
    output.description = "Values a subgraph reports back".into();
    output.inputs.push(Port::array_input(SUBGRAPH_INPUT_PORT, PortType::Any, GRAPH_IO_SLOTS));
    catalog.register(output);

    let mut external = NodeType::new("graph_external", "Subgraph", NodeCategory::Graph);
    external.description = "Runs an embedded subgraph".into();
    external.inputs.push(Port::array_input(SUBGRAPH_INPUT_PORT, PortType::Any, GRAPH_IO_SLOTS));
    external.outputs.push(Port::array_output(SUBGRAPH_OUTPUT_PORT, PortType::Any, GRAPH_IO_SLOTS));
    catalog.register(external);

    catalog
}

#[derive(Debug)]
struct Slider;

impl NodeBehavior for Slider {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let float = |name: &str, fallback: f32| {
            ctx.property(name)
                .and_then(PortValue::as_float)
                .filter(|v| !v.is_nan())
                .unwrap_or(fallback)
        };
        let (a, b) = (float("min", 0.0), float("max", 1.0));
        let (min, max) = if a <= b { (a, b) } else { (b, a) };
        let value = float("value", min).clamp(min, max);
        ctx.fields.set_value("value", value)?;
        Ok(())
    }
}

fn slider_type() -> NodeType {
    let mut ty = NodeType::new("slider", "Slider", NodeCategory::Input);
    ty.description = "Clamped editable number".into();
    ty.outputs.push(Port::output("value", PortType::Float));
    ty.properties.insert("value".into(), PortValue::Float(0.5));
    ty.properties.insert("min".into(), PortValue::Float(0.0));
    ty.properties.insert("max".into(), PortValue::Float(1.0));
    ty.behavior = || Box::new(Slider);
    ty
}

#[derive(Debug)]
struct Constant;

impl NodeBehavior for Constant {
    fn process(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        Ok(())
    }

    fn process_once(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        match ctx.property("value").cloned() {
            Some(value) => ctx.fields.set_value("value", value)?,
            None => ctx.fields.clear_value("value")?,
        }
        Ok(())
    }
}

fn constant_type() -> NodeType {
    let mut ty = NodeType::new("constant", "Constant", NodeCategory::Input);
    ty.description = "Value seeded once".into();
    ty.outputs.push(Port::output("value", PortType::Any));
    ty.properties.insert("value".into(), PortValue::Float(0.0));
    ty.behavior = || Box::new(Constant);
    ty
}

#[derive(Debug)]
struct Add;

impl NodeBehavior for Add {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        let values = ctx
            .fields
            .array("values")
            .ok_or_else(|| NodeError::MissingInput("values".into()))?;
        let sum: f32 = values.values().flatten().filter_map(PortValue::as_float).sum();
        ctx.fields.set_value("sum", sum)?;
        Ok(())
    }
}

fn add_type() -> NodeType {
    let mut ty = NodeType::new("add", "Add", NodeCategory::Math);
    ty.description = "Sum of the numeric operands".into();
    ty.inputs.push(Port::array_input("values", PortType::Float, ADD_OPERAND_SLOTS));
    ty.outputs.push(Port::output("sum", PortType::Float));
    ty.behavior = || Box::new(Add);
    ty
}

#[derive(Debug)]
struct DebugLog;

impl NodeBehavior for DebugLog {
    fn process(&mut self, ctx: &mut ProcessContext<'_>) -> Result<(), NodeError> {
        match ctx.fields.value("value") {
            Some(value) => tracing::info!("{}: {}", ctx.node_id, value),
            None => tracing::info!("{}: null", ctx.node_id),
        }
        Ok(())
    }
}

fn debug_log_type() -> NodeType {
    let mut ty = NodeType::new("debug_log", "Debug Log", NodeCategory::Debug);
    ty.description = "Logs its input".into();
    ty.inputs.push(Port::input("value", PortType::Any));
    ty.behavior = || Box::new(DebugLog);
    ty
}
