//! Subscriber lists and the link control messages that edit them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::hashing::{hash_name, NameHash, TypeTag};
use crate::messaging::envelope::{Mail, Payload};
use crate::runtime::Address;

/// One entry in an output port's subscriber list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscriber {
    pub input: NameHash,
    pub address: Address,
}

/// Directed edge from an output port to a remote input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub output: NameHash,
    pub input: NameHash,
    pub address: Address,
}

impl Link {
    pub fn new(output: &str, input: &str, address: Address) -> Self {
        Self {
            output: hash_name(output),
            input: hash_name(input),
            address,
        }
    }

    pub fn subscriber(&self) -> Subscriber {
        Subscriber {
            input: self.input,
            address: self.address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOp {
    Add,
    Remove,
}

/// Request for the receiving Part to edit one of its subscriber lists.
///
/// Carries the payload kind's tag so it is routed to the output table of
/// that type, exactly like a data envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkControl {
    pub op: LinkOp,
    pub type_tag: TypeTag,
    pub output: NameHash,
    pub input: NameHash,
    pub subscriber: Address,
}

impl LinkControl {
    /// Ask the receiver to feed its output `output` into `input` on `subscriber`.
    pub fn add<T: Payload>(output: &str, input: &str, subscriber: Address) -> Self {
        Self::for_link::<T>(LinkOp::Add, Link::new(output, input, subscriber))
    }

    pub fn remove<T: Payload>(output: &str, input: &str, subscriber: Address) -> Self {
        Self::for_link::<T>(LinkOp::Remove, Link::new(output, input, subscriber))
    }

    pub fn for_link<T: Payload>(op: LinkOp, link: Link) -> Self {
        Self {
            op,
            type_tag: T::type_tag(),
            output: link.output,
            input: link.input,
            subscriber: link.address,
        }
    }

    pub fn link(&self) -> Link {
        Link {
            output: self.output,
            input: self.input,
            address: self.subscriber,
        }
    }

    pub fn into_mail(self) -> Mail {
        Mail::Link(self)
    }
}

/// A named output and the subscribers it fans out to.
///
/// Subscribers are kept in insertion order and are not deduplicated:
/// adding the same subscriber twice yields two deliveries per write.
#[derive(Debug, Clone)]
pub struct OutputPort {
    name: Arc<str>,
    subscribers: Vec<Subscriber>,
}

impl OutputPort {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            subscribers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn add_subscriber(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Remove the first entry equal to `subscriber`.
    pub fn remove_subscriber(&mut self, subscriber: &Subscriber) -> bool {
        match self.subscribers.iter().position(|s| s == subscriber) {
            Some(index) => {
                self.subscribers.remove(index);
                true
            }
            None => false,
        }
    }
}
