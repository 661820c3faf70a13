// SPDX-License-Identifier: MIT OR Apache-2.0
//! Array ports: ordered sequences of named slots.
//!
//! The owning node decides how many slots an array has. Writers address an
//! existing slot by index and never grow the array.

use crate::error::SlotError;
use crate::port::{PortType, PortValue};
use serde::{Deserialize, Serialize};

/// One addressable element of an array port
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Current value
    pub value: Option<PortValue>,
    /// Name of the port that last wrote this slot
    pub source: Option<String>,
}

impl Slot {
    /// Whether the slot holds a value
    pub fn is_occupied(&self) -> bool {
        self.value.is_some()
    }
}

/// An ordered, typed array of slots backing an array port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotArray {
    element_type: PortType,
    slots: Vec<Slot>,
}

impl SlotArray {
    /// Create an empty array accepting values of `element_type`
    pub fn new(element_type: PortType) -> Self {
        Self {
            element_type,
            slots: Vec::new(),
        }
    }

    /// Create an array with `count` empty slots
    pub fn with_slots(element_type: PortType, count: usize) -> Self {
        Self {
            element_type,
            slots: vec![Slot::default(); count],
        }
    }

    /// Element type accepted by this array
    pub fn element_type(&self) -> &PortType {
        &self.element_type
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the array has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Explicitly resize the array. New slots start empty.
    pub fn set_slot_count(&mut self, count: usize) {
        self.slots.resize(count, Slot::default());
    }

    /// Append a slot holding `value`
    pub fn push(&mut self, value: Option<PortValue>, source: Option<String>) -> usize {
        self.slots.push(Slot { value, source });
        self.slots.len() - 1
    }

    /// Slot at `index`
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Value at `index`. Out of bounds is an error, an empty slot is `Ok(None)`.
    pub fn at(&self, index: usize) -> Result<Option<&PortValue>, SlotError> {
        self.slots
            .get(index)
            .map(|slot| slot.value.as_ref())
            .ok_or(SlotError::OutOfBounds {
                index,
                len: self.slots.len(),
            })
    }

    /// Source tag of the slot at `index`
    pub fn source_at(&self, index: usize) -> Option<&str> {
        self.slots.get(index).and_then(|slot| slot.source.as_deref())
    }

    /// Write `value` into the slot at `index`, tagging it with `source`.
    ///
    /// Without `force` an occupied slot is left alone and `Occupied` is returned.
    pub fn assign_at(
        &mut self,
        index: usize,
        value: Option<PortValue>,
        source: impl Into<String>,
        force: bool,
    ) -> Result<(), SlotError> {
        let len = self.slots.len();
        if let Some(value) = &value {
            let found = value.port_type();
            if !found.can_connect_to(&self.element_type) {
                return Err(SlotError::TypeMismatch {
                    expected: self.element_type.clone(),
                    found,
                });
            }
        }

        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::OutOfBounds { index, len })?;

        if !force && slot.is_occupied() {
            return Err(SlotError::Occupied(index));
        }

        slot.value = value;
        slot.source = Some(source.into());
        Ok(())
    }

    /// Empty every slot, keeping the slot count
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::default();
        }
    }

    /// Iterate over slot values
    pub fn values(&self) -> impl Iterator<Item = Option<&PortValue>> {
        self.slots.iter().map(|slot| slot.value.as_ref())
    }

    /// Iterate over slot source tags
    pub fn sources(&self) -> impl Iterator<Item = Option<&str>> {
        self.slots.iter().map(|slot| slot.source.as_deref())
    }

    /// Iterate over slots
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }
}
