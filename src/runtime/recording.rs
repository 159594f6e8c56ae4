//! In-memory runtime that records traffic instead of delivering it.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::hashing::TypeTag;
use crate::messaging::envelope::{Delivery, Mail};
use crate::runtime::{Address, Runtime};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSend {
    pub from: Address,
    pub to: Address,
    pub mail: Mail,
}

/// Runtime double for driving Parts by hand.
///
/// Every `send` is accepted and appended to a log. Handler hooks are kept
/// per owner and counted so tests can assert how often a Part asked for
/// them. `refuse_registrations` makes every later hook request fail.
#[derive(Debug, Default)]
pub struct RecordingRuntime {
    sent: Mutex<Vec<RecordedSend>>,
    hooks: DashMap<Address, HashSet<TypeTag>>,
    registrations: DashMap<(Address, TypeTag), u64>,
    refuse: AtomicBool,
    next_address: AtomicU64,
}

impl RecordingRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_address: AtomicU64::new(1),
            ..Default::default()
        })
    }

    /// Hand out a fresh address.
    pub fn allocate(&self) -> Address {
        Address(self.next_address.fetch_add(1, Ordering::Relaxed).max(1))
    }

    pub fn refuse_registrations(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of successful `register_handler` calls for `(owner, tag)`.
    pub fn registration_count(&self, owner: Address, tag: TypeTag) -> u64 {
        self.registrations.get(&(owner, tag)).map(|c| *c).unwrap_or(0)
    }

    /// Everything sent so far, in submission order.
    pub fn sent(&self) -> Vec<RecordedSend> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Remove and return everything sent to `to`, as mailbox deliveries.
    pub fn take_for(&self, to: Address) -> Vec<Delivery> {
        let Ok(mut sent) = self.sent.lock() else {
            return Vec::new();
        };
        let (taken, kept): (Vec<_>, Vec<_>) = sent.drain(..).partition(|s| s.to == to);
        *sent = kept;
        taken
            .into_iter()
            .map(|s| Delivery {
                from: s.from,
                mail: s.mail,
            })
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl Runtime for RecordingRuntime {
    fn send(&self, from: Address, to: Address, mail: Mail) -> bool {
        match self.sent.lock() {
            Ok(mut sent) => {
                sent.push(RecordedSend { from, to, mail });
                true
            }
            Err(_) => false,
        }
    }

    fn register_handler(&self, owner: Address, tag: TypeTag) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.hooks.entry(owner).or_default().insert(tag);
        *self.registrations.entry((owner, tag)).or_insert(0) += 1;
        true
    }

    fn deregister_handler(&self, owner: Address, tag: TypeTag) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.hooks
            .get_mut(&owner)
            .map(|mut tags| tags.remove(&tag))
            .unwrap_or(false)
    }

    fn is_handler_registered(&self, owner: Address, tag: TypeTag) -> bool {
        self.hooks
            .get(&owner)
            .map(|tags| tags.contains(&tag))
            .unwrap_or(false)
    }
}
