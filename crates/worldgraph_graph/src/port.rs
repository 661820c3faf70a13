// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port declarations for node inputs/outputs and the values they carry.

use crate::error::FieldError;
use crate::slots::SlotArray;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortType {
    /// Boolean value
    Bool,
    /// Integer value
    Int,
    /// Floating point value
    Float,
    /// 2D vector
    Vector2,
    /// 3D vector
    Vector3,
    /// 4D vector
    Vector4,
    /// Color (RGBA)
    Color,
    /// String value
    String,
    /// Any type (for generic nodes)
    Any,
    /// Custom type
    Custom(String),
}

impl PortType {
    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        // Implicit conversions
        match (self, other) {
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => true,
            (Self::Float, Self::Vector2 | Self::Vector3 | Self::Vector4) => true,
            (Self::Vector2, Self::Vector3 | Self::Vector4) => true,
            (Self::Vector3, Self::Vector4) => true,
            (Self::Color, Self::Vector4) | (Self::Vector4, Self::Color) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name) => write!(f, "{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Shape of the field backing a port.
///
/// A port's kind is fixed when its node type is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// A single value
    Scalar,
    /// An ordered array of named slots
    Array,
}

/// A port declaration on a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique within its node type
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
    /// Scalar or array
    pub kind: PortKind,
    /// Initial value for scalar ports
    pub default_value: Option<PortValue>,
    /// Initial slot count for array ports
    pub slot_count: usize,
    /// Whether multiple links may target the same port (or slot)
    pub multi_connect: bool,
}

impl Port {
    /// Create a new port
    pub fn new(
        name: impl Into<String>,
        port_type: PortType,
        direction: PortDirection,
        kind: PortKind,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            port_type,
            kind,
            default_value: None,
            slot_count: 0,
            // Outputs can feed multiple links by default
            multi_connect: direction == PortDirection::Output,
        }
    }

    /// Create a new scalar input port
    pub fn input(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, port_type, PortDirection::Input, PortKind::Scalar)
    }

    /// Create a new scalar output port
    pub fn output(name: impl Into<String>, port_type: PortType) -> Self {
        Self::new(name, port_type, PortDirection::Output, PortKind::Scalar)
    }

    /// Create a new array input port with `slots` initial slots
    pub fn array_input(name: impl Into<String>, port_type: PortType, slots: usize) -> Self {
        Self::new(name, port_type, PortDirection::Input, PortKind::Array).with_slots(slots)
    }

    /// Create a new array output port with `slots` initial slots
    pub fn array_output(name: impl Into<String>, port_type: PortType, slots: usize) -> Self {
        Self::new(name, port_type, PortDirection::Output, PortKind::Array).with_slots(slots)
    }

    /// Set the default value
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the initial slot count
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slot_count = slots;
        self
    }

    /// Check if a link from this port into `other` is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if self.direction == other.direction {
            return false;
        }

        self.port_type.can_connect_to(&other.port_type)
    }

    /// Build the empty field that backs this port on a fresh node
    pub fn initial_field(&self) -> PortField {
        match self.kind {
            PortKind::Scalar => PortField::Scalar(self.default_value.clone()),
            PortKind::Array => PortField::Array(Some(SlotArray::with_slots(
                self.port_type.clone(),
                self.slot_count,
            ))),
        }
    }
}

/// Value that can be stored in a port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i32),
    /// Float
    Float(f32),
    /// 2D vector
    Vector2([f32; 2]),
    /// 3D vector
    Vector3([f32; 3]),
    /// 4D vector
    Vector4([f32; 4]),
    /// Color
    Color([f32; 4]),
    /// String
    String(String),
}

impl PortValue {
    /// Get the port type for this value
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Bool(_) => PortType::Bool,
            Self::Int(_) => PortType::Int,
            Self::Float(_) => PortType::Float,
            Self::Vector2(_) => PortType::Vector2,
            Self::Vector3(_) => PortType::Vector3,
            Self::Vector4(_) => PortType::Vector4,
            Self::Color(_) => PortType::Color,
            Self::String(_) => PortType::String,
        }
    }

    /// Numeric value as a float, if this is a number
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Integer value, if this is an integer
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Vector2(v) => write!(f, "{v:?}"),
            Self::Vector3(v) => write!(f, "{v:?}"),
            Self::Vector4(v) | Self::Color(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for PortValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PortValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for PortValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PortValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PortValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Storage behind one port on a node instance.
///
/// `None` is an unset field: propagating from it is skipped in interactive mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PortField {
    /// A scalar port
    Scalar(Option<PortValue>),
    /// An array port
    Array(Option<SlotArray>),
}

impl PortField {
    /// The declared kind of this field
    pub fn kind(&self) -> PortKind {
        match self {
            Self::Scalar(_) => PortKind::Scalar,
            Self::Array(_) => PortKind::Array,
        }
    }

    /// Whether the field currently holds no value
    pub fn is_null(&self) -> bool {
        match self {
            Self::Scalar(value) => value.is_none(),
            Self::Array(array) => array.is_none(),
        }
    }

    /// Scalar value, if this is a set scalar field
    pub fn value(&self) -> Option<&PortValue> {
        match self {
            Self::Scalar(value) => value.as_ref(),
            Self::Array(_) => None,
        }
    }

    /// Slot array, if this is a set array field
    pub fn array(&self) -> Option<&SlotArray> {
        match self {
            Self::Array(array) => array.as_ref(),
            Self::Scalar(_) => None,
        }
    }

    /// Mutable slot array, if this is a set array field
    pub fn array_mut(&mut self) -> Option<&mut SlotArray> {
        match self {
            Self::Array(array) => array.as_mut(),
            Self::Scalar(_) => None,
        }
    }

    /// Replace the whole field. The kind may not change.
    pub fn assign(&mut self, other: PortField) -> Result<(), FieldError> {
        if self.kind() != other.kind() {
            return Err(FieldError::KindMismatch {
                expected: self.kind(),
                found: other.kind(),
            });
        }
        *self = other;
        Ok(())
    }
}
