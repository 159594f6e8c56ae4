//! Port registry owned by one Part.
//!
//! Inputs are grouped per payload tag behind a single [`InputDispatch`], so
//! the runtime hook for a tag is requested once no matter how many inputs of
//! that type exist. Outputs are grouped the same way; a link names an output
//! and the tag of its payload, and lands in that table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::core::errors::{PartError, Result};
use crate::core::hashing::{hash_name, NameHash, TypeTag};
use crate::messaging::envelope::Payload;
use crate::ports::dispatch::{InputDispatch, InputHandler, TypedInputs};
use crate::ports::link::{Link, LinkControl, LinkOp, OutputPort};
use crate::runtime::{Address, Runtime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
}

/// Diagnostic description of one port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortInfo {
    pub name: String,
    pub type_name: String,
    pub direction: Direction,
}

/// Answer to a port query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortListing {
    pub part: String,
    pub inputs: Vec<PortInfo>,
    pub outputs: Vec<PortInfo>,
}

struct OutputTable {
    type_name: &'static str,
    ports: HashMap<NameHash, OutputPort>,
}

/// Inputs and outputs of one Part, keyed by payload tag then name hash.
pub struct PortRegistry<B> {
    owner: Address,
    part_name: String,
    inputs: HashMap<TypeTag, Box<dyn InputDispatch<B>>>,
    outputs: HashMap<TypeTag, OutputTable>,
}

impl<B: 'static> PortRegistry<B> {
    pub fn new(owner: Address, part_name: impl Into<String>) -> Self {
        Self {
            owner,
            part_name: part_name.into(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    fn check_type<T: Payload>(&self) -> Result<()> {
        let tag = T::type_tag();
        let existing = self
            .inputs
            .get(&tag)
            .map(|d| d.type_name())
            .or_else(|| self.outputs.get(&tag).map(|t| t.type_name));
        match existing {
            Some(name) if name != T::TYPE_NAME => {
                Err(PartError::type_conflict(tag, name, T::TYPE_NAME))
            }
            _ => Ok(()),
        }
    }

    /// Add or replace the input `name` of type `T`.
    ///
    /// The first input of a type hooks the runtime dispatcher for that tag;
    /// if the runtime refuses, the Part is indeterminate. Returns `true`
    /// when an existing handler was replaced.
    pub fn add_input<T: Payload>(
        &mut self,
        runtime: &dyn Runtime,
        name: &str,
        handler: InputHandler<B, T>,
    ) -> Result<bool> {
        self.check_type::<T>()?;
        let tag = T::type_tag();

        if !self.inputs.contains_key(&tag) {
            if !runtime.is_handler_registered(self.owner, tag)
                && !runtime.register_handler(self.owner, tag)
            {
                warn!(part = %self.part_name, type_name = T::TYPE_NAME, %tag, "runtime refused dispatcher");
                return Err(PartError::indeterminate(
                    &self.part_name,
                    format!("runtime refused dispatcher for {} ({})", T::TYPE_NAME, tag),
                ));
            }
            debug!(part = %self.part_name, type_name = T::TYPE_NAME, "dispatcher hooked");
            self.inputs
                .insert(tag, Box::new(TypedInputs::<B, T>::new()));
        }

        let table = self
            .inputs
            .get_mut(&tag)
            .and_then(|d| d.as_any_mut().downcast_mut::<TypedInputs<B, T>>())
            .ok_or_else(|| PartError::type_conflict(tag, "<other>", T::TYPE_NAME))?;
        table.insert(name, hash_name(name), handler).map_err(|err| {
            warn!(part = %self.part_name, input = name, error = %err, "input name collision");
            err
        })
    }

    /// Remove the input `name` of type `T`. The last input of a type
    /// releases the runtime hook.
    pub fn remove_input<T: Payload>(&mut self, runtime: &dyn Runtime, name: &str) -> bool {
        let tag = T::type_tag();
        let Some(table) = self.inputs.get_mut(&tag) else {
            return false;
        };
        if table.type_name() != T::TYPE_NAME || !table.remove(name) {
            return false;
        }
        if table.is_empty() {
            if runtime.deregister_handler(self.owner, tag) {
                self.inputs.remove(&tag);
                debug!(part = %self.part_name, type_name = T::TYPE_NAME, "dispatcher released");
            } else {
                warn!(part = %self.part_name, type_name = T::TYPE_NAME, "runtime kept dispatcher hook");
            }
        }
        true
    }

    /// Add an output port. Returns `false` if it already exists, the name is
    /// reserved, its hash is taken by another name, or its tag is taken by a
    /// different type name.
    pub fn add_output<T: Payload>(&mut self, name: &str) -> bool {
        let hash = hash_name(name);
        if hash.is_reserved() || self.check_type::<T>().is_err() {
            return false;
        }
        let table = self
            .outputs
            .entry(T::type_tag())
            .or_insert_with(|| OutputTable {
                type_name: T::TYPE_NAME,
                ports: HashMap::new(),
            });
        if let Some(existing) = table.ports.get(&hash) {
            if existing.name() != name {
                warn!(part = %self.part_name, output = name, existing = existing.name(), %hash, "output name collision");
            }
            return false;
        }
        table.ports.insert(hash, OutputPort::new(name));
        true
    }

    /// Remove an output port together with its links. Subscribers are not
    /// told.
    pub fn remove_output<T: Payload>(&mut self, name: &str) -> bool {
        let tag = T::type_tag();
        let Some(table) = self.outputs.get_mut(&tag) else {
            return false;
        };
        if table.type_name != T::TYPE_NAME {
            return false;
        }
        let hash = hash_name(name);
        let removed = match table.ports.get(&hash) {
            Some(port) if port.name() == name => table.ports.remove(&hash).is_some(),
            _ => false,
        };
        if table.ports.is_empty() {
            self.outputs.remove(&tag);
        }
        removed
    }

    pub fn output(&self, tag: TypeTag, output: NameHash) -> Option<&OutputPort> {
        self.outputs.get(&tag)?.ports.get(&output)
    }

    pub fn output_mut(&mut self, tag: TypeTag, output: NameHash) -> Option<&mut OutputPort> {
        self.outputs.get_mut(&tag)?.ports.get_mut(&output)
    }

    pub fn add_link(&mut self, tag: TypeTag, link: Link) -> bool {
        match self.output_mut(tag, link.output) {
            Some(port) => {
                port.add_subscriber(link.subscriber());
                true
            }
            None => false,
        }
    }

    pub fn remove_link(&mut self, tag: TypeTag, link: Link) -> bool {
        self.output_mut(tag, link.output)
            .map(|port| port.remove_subscriber(&link.subscriber()))
            .unwrap_or(false)
    }

    pub fn apply_link_control(&mut self, control: &LinkControl) -> bool {
        match control.op {
            LinkOp::Add => self.add_link(control.type_tag, control.link()),
            LinkOp::Remove => self.remove_link(control.type_tag, control.link()),
        }
    }

    pub fn input_dispatch(&self, tag: TypeTag) -> Option<&dyn InputDispatch<B>> {
        self.inputs.get(&tag).map(|d| d.as_ref())
    }

    pub fn has_input<T: Payload>(&self, name: &str) -> bool {
        self.inputs
            .get(&T::type_tag())
            .map(|d| d.contains(name))
            .unwrap_or(false)
    }

    pub fn has_output<T: Payload>(&self, name: &str) -> bool {
        self.output(T::type_tag(), hash_name(name))
            .map(|port| port.name() == name)
            .unwrap_or(false)
    }

    /// Number of per-type dispatchers currently held.
    pub fn dispatcher_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_ports(&self) -> Vec<PortInfo> {
        let mut ports: Vec<PortInfo> = self
            .inputs
            .values()
            .flat_map(|d| {
                let type_name = d.type_name();
                d.names().into_iter().map(move |name| PortInfo {
                    name: name.to_string(),
                    type_name: type_name.to_string(),
                    direction: Direction::Input,
                })
            })
            .collect();
        ports.sort();
        ports
    }

    pub fn output_ports(&self) -> Vec<PortInfo> {
        let mut ports: Vec<PortInfo> = self
            .outputs
            .values()
            .flat_map(|t| {
                t.ports.values().map(move |port| PortInfo {
                    name: port.name().to_string(),
                    type_name: t.type_name.to_string(),
                    direction: Direction::Output,
                })
            })
            .collect();
        ports.sort();
        ports
    }

    pub fn listing(&self) -> PortListing {
        PortListing {
            part: self.part_name.clone(),
            inputs: self.input_ports(),
            outputs: self.output_ports(),
        }
    }
}
