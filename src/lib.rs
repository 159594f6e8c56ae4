//! Typed, named ports for actor-style Parts.
//!
//! Parts expose named input and output ports, get wired together at runtime
//! by link messages, and stay in step through token-gated delivery and
//! broadcast synchronization requests.
//!
//! ```no_run
//! use partwire::core::logging::init_tracing;
//! use partwire::{
//!     hash_name, Behavior, Domain, Envelope, InputContext, LocalRuntime, Mail, Origin,
//!     PartConfig, PartIo, Result, RuntimeConfig, Token,
//! };
//!
//! struct Display;
//!
//! impl Behavior for Display {
//!     fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()> {
//!         io.add_input_port("readTemp", |_: &mut Self, _: &mut PartIo<Self>, _: &InputContext, v: f32| {
//!             tracing::info!(v, "reading");
//!         })?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     init_tracing(tracing::Level::INFO);
//!     let runtime = LocalRuntime::new(RuntimeConfig::default())?;
//!     let display = runtime.spawn(Display, PartConfig::named("display"), &Domain::default())?;
//!     let reading = Envelope::encode(&21.5f32, hash_name("readTemp"), Origin::Direct, Token(0))?;
//!     display.send(Mail::Input(reading));
//!     display.stop().await?;
//!     Ok(())
//! }
//! ```

// Core infrastructure modules
pub mod core {
    pub mod config;
    pub mod errors;
    pub mod hashing;
    pub mod logging;
}

pub mod messaging; // Envelopes, mail and sync messages
pub mod part;      // Part host, behavior hooks, per-invocation context
pub mod ports;     // Port registry, per-type dispatch, links
pub mod runtime;   // Runtime seam plus local and recording hosts

// Re-exports for convenience
pub use core::config::{PartConfig, RuntimeConfig, RuntimeConfigBuilder};
pub use core::errors::{PartError, Result};
pub use core::hashing::{hash_name, NameHash, TypeTag};
pub use messaging::envelope::{Delivery, Envelope, InputEnvelope, Mail, Origin, Payload, Token};
pub use messaging::sync::{RequestId, SyncReply, SyncRequest, SyncTracker};
pub use part::{Behavior, DispatchOutcome, Domain, InputContext, Part, PartIo};
pub use ports::{Direction, Link, LinkControl, LinkOp, PortInfo, PortListing, Subscriber};
pub use runtime::{Address, LocalRuntime, PartHandle, RecordingRuntime, Runtime};
