//! Wire-level message types.
//!
//! Payloads travel as bincode bytes inside an [`Envelope`] tagged with the
//! payload kind's [`TypeTag`]. The receiving dispatcher checks the tag and
//! decodes with the codec of the type it was registered for.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::core::hashing::{NameHash, TypeTag};
use crate::messaging::sync::{SyncReply, SyncRequest};
use crate::ports::registry::PortListing;
use crate::ports::link::LinkControl;
use crate::runtime::Address;

/// Epoch / authorization tag carried by every input envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Token(pub i64);

impl From<i64> for Token {
    fn from(value: i64) -> Self {
        Token(value)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A payload kind that can flow through ports.
///
/// `TYPE_NAME` must be identical in every process exchanging the type;
/// its hash is the routing discriminant.
pub trait Payload: Serialize + DeserializeOwned + Send + 'static {
    const TYPE_NAME: &'static str;

    fn type_tag() -> TypeTag {
        TypeTag::of(Self::TYPE_NAME)
    }
}

/// Implement [`Payload`] for a type under a stable name.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Reading { celsius: f64 }
/// partwire::payload!(Reading => "thermo.Reading");
/// ```
#[macro_export]
macro_rules! payload {
    ($($ty:ty => $name:expr),+ $(,)?) => {
        $(
            impl $crate::messaging::envelope::Payload for $ty {
                const TYPE_NAME: &'static str = $name;
            }
        )+
    };
}

payload!(
    bool => "bool",
    i32 => "i32",
    i64 => "i64",
    u32 => "u32",
    u64 => "u64",
    f32 => "f32",
    f64 => "f64",
    String => "string",
    Vec<u8> => "bytes",
);

/// Where an envelope came from on the sending Part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// Fan-out from the named output port
    Output(NameHash),
    /// Point-to-point send that did not come from an output port
    Direct,
}

impl Origin {
    pub fn to_wire(self) -> NameHash {
        match self {
            Origin::Output(hash) => hash,
            Origin::Direct => NameHash::NO_OUTPUT,
        }
    }

    pub fn from_wire(hash: NameHash) -> Self {
        if hash.is_reserved() {
            Origin::Direct
        } else {
            Origin::Output(hash)
        }
    }
}

/// Type-erased input envelope as carried by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub type_tag: TypeTag,
    pub input: NameHash,
    pub origin: Origin,
    pub token: Token,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Encode `value` for delivery to `input`.
    pub fn encode<T: Payload>(value: &T, input: NameHash, origin: Origin, token: Token) -> Result<Self> {
        Ok(Self {
            type_tag: T::type_tag(),
            input,
            origin,
            token,
            payload: bincode::serialize(value)?,
        })
    }

    /// Decode the payload as `T`, returning `None` if the tag or bytes do
    /// not belong to `T`.
    pub fn decode<T: Payload>(&self) -> Option<T> {
        if self.type_tag != T::type_tag() {
            return None;
        }
        bincode::deserialize(&self.payload).ok()
    }

    /// Re-address a copy of this envelope to another input.
    pub fn readdressed(&self, input: NameHash) -> Self {
        Self {
            input,
            ..self.clone()
        }
    }
}

/// Typed view of an [`Envelope`], matching the documented wire record
/// `{ inputNameHash, token, payload }`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputEnvelope<T> {
    pub input: NameHash,
    pub token: Token,
    pub payload: T,
}

impl<T: Payload> InputEnvelope<T> {
    pub fn new(input: NameHash, token: Token, payload: T) -> Self {
        Self {
            input,
            token,
            payload,
        }
    }

    pub fn into_envelope(self, origin: Origin) -> Result<Envelope> {
        Envelope::encode(&self.payload, self.input, origin, self.token)
    }

    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        envelope.decode::<T>().map(|payload| Self {
            input: envelope.input,
            token: envelope.token,
            payload,
        })
    }
}

/// Everything one Part can put in another Part's mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mail {
    Input(Envelope),
    Link(LinkControl),
    Sync(SyncRequest),
    SyncReply(SyncReply),
    PortQuery,
    PortListing(PortListing),
}

impl Mail {
    pub fn kind(&self) -> &'static str {
        match self {
            Mail::Input(_) => "input",
            Mail::Link(_) => "link",
            Mail::Sync(_) => "sync",
            Mail::SyncReply(_) => "sync_reply",
            Mail::PortQuery => "port_query",
            Mail::PortListing(_) => "port_listing",
        }
    }
}

/// A mailbox entry: the mail plus the address of its sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub from: Address,
    pub mail: Mail,
}
