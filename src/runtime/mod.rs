//! Actor runtime seam.
//!
//! Parts never touch each other's memory; everything crosses a [`Runtime`],
//! which owns addressing, mailboxes and per-type handler hooks. Two
//! implementations ship with the crate: [`LocalRuntime`] hosts Parts on
//! tokio tasks, [`RecordingRuntime`] captures traffic for tests.

pub mod local;
pub mod recording;

pub use local::{LocalRuntime, PartHandle};
pub use recording::{RecordedSend, RecordingRuntime};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::hashing::TypeTag;
use crate::messaging::envelope::Mail;

/// Opaque, runtime-assigned identifier of a Part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub u64);

impl Address {
    /// Sender address for mail injected from outside any Part.
    pub const EXTERNAL: Address = Address(0);
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part@{}", self.0)
    }
}

/// Services a Part needs from its host.
///
/// All methods are non-blocking. `send` reports whether the mail was
/// accepted for delivery, not whether it was processed.
pub trait Runtime: Send + Sync {
    fn send(&self, from: Address, to: Address, mail: Mail) -> bool;

    /// Hook the mailbox dispatcher for `tag` on `owner`.
    fn register_handler(&self, owner: Address, tag: TypeTag) -> bool;

    /// Unhook the mailbox dispatcher for `tag` on `owner`.
    fn deregister_handler(&self, owner: Address, tag: TypeTag) -> bool;

    fn is_handler_registered(&self, owner: Address, tag: TypeTag) -> bool;
}
