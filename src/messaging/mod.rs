pub mod envelope;
pub mod sync;

pub use envelope::{Delivery, Envelope, InputEnvelope, Mail, Origin, Payload, Token};
pub use sync::{RequestId, SyncReply, SyncRequest, SyncTracker};
