//! Per-type input dispatch.
//!
//! A Part owns at most one [`InputDispatch`] per payload tag. It holds the
//! named handlers for that type and is the only place an envelope's bytes
//! are turned back into a value, after the tag has been checked.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::errors::{PartError, Result};
use crate::core::hashing::{hash_name, NameHash, TypeTag};
use crate::messaging::envelope::{Envelope, Payload};
use crate::part::{InputContext, PartIo};

/// Handler for one named input of type `T`.
pub type InputHandler<B, T> = Arc<dyn Fn(&mut B, &mut PartIo<B>, &InputContext, T) + Send + Sync>;

/// A handler bound to its decoded value, ready to run.
pub type PreparedCall<B> = Box<dyn FnOnce(&mut B, &mut PartIo<B>, &InputContext)>;

/// Result of resolving an envelope against a dispatcher.
pub enum Prepared<B> {
    Call {
        input_name: Arc<str>,
        call: PreparedCall<B>,
    },
    /// No input of that name for this type.
    Missing,
    /// The envelope does not belong to this dispatcher's type.
    Mismatch(String),
}

/// Type-erased face of a per-type handler table.
pub trait InputDispatch<B>: Send + Sync {
    fn type_tag(&self) -> TypeTag;

    fn type_name(&self) -> &'static str;

    /// Look up the handler for `envelope.input` and decode the payload.
    fn prepare(&self, envelope: &Envelope) -> Prepared<B>;

    fn contains(&self, name: &str) -> bool;

    /// Remove the input `name`. A different name stored under the same
    /// hash is left alone.
    fn remove(&mut self, name: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered input names, sorted.
    fn names(&self) -> Vec<Arc<str>>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct InputEntry<B, T> {
    name: Arc<str>,
    handler: InputHandler<B, T>,
}

/// Handler table for payload type `T`.
pub struct TypedInputs<B, T> {
    handlers: HashMap<NameHash, InputEntry<B, T>>,
    _kind: PhantomData<fn(T)>,
}

impl<B: 'static, T: Payload> TypedInputs<B, T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            _kind: PhantomData,
        }
    }

    /// Insert or overwrite the handler for `name`. Returns `true` if a
    /// handler was replaced.
    ///
    /// A different name already stored under `hash` is a CRC collision and
    /// is refused, leaving the table unchanged.
    pub fn insert(&mut self, name: &str, hash: NameHash, handler: InputHandler<B, T>) -> Result<bool> {
        if let Some(existing) = self.handlers.get(&hash) {
            if &*existing.name != name {
                return Err(PartError::name_collision(name, &*existing.name, hash));
            }
        }
        let entry = InputEntry {
            name: Arc::from(name),
            handler,
        };
        Ok(self.handlers.insert(hash, entry).is_some())
    }
}

impl<B: 'static, T: Payload> Default for TypedInputs<B, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: 'static, T: Payload> InputDispatch<B> for TypedInputs<B, T> {
    fn type_tag(&self) -> TypeTag {
        T::type_tag()
    }

    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn prepare(&self, envelope: &Envelope) -> Prepared<B> {
        if envelope.type_tag != T::type_tag() {
            return Prepared::Mismatch(format!(
                "{} routed to {} dispatcher",
                envelope.type_tag,
                T::TYPE_NAME
            ));
        }
        let Some(entry) = self.handlers.get(&envelope.input) else {
            return Prepared::Missing;
        };
        let value: T = match bincode::deserialize(&envelope.payload) {
            Ok(value) => value,
            Err(err) => return Prepared::Mismatch(err.to_string()),
        };
        let handler = entry.handler.clone();
        Prepared::Call {
            input_name: entry.name.clone(),
            call: Box::new(
                move |behavior: &mut B, io: &mut PartIo<B>, ctx: &InputContext| {
                    handler(behavior, io, ctx, value)
                },
            ),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.handlers
            .get(&hash_name(name))
            .map(|entry| &*entry.name == name)
            .unwrap_or(false)
    }

    fn remove(&mut self, name: &str) -> bool {
        let hash = hash_name(name);
        match self.handlers.get(&hash) {
            Some(entry) if &*entry.name == name => self.handlers.remove(&hash).is_some(),
            _ => false,
        }
    }

    fn len(&self) -> usize {
        self.handlers.len()
    }

    fn names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<_> = self.handlers.values().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::envelope::{Origin, Token};

    struct Sink;

    fn noop() -> InputHandler<Sink, f32> {
        Arc::new(|_: &mut Sink, _: &mut PartIo<Sink>, _: &InputContext, _: f32| {})
    }

    #[test]
    fn test_insert_overwrites() {
        let mut table = TypedInputs::<Sink, f32>::new();
        assert!(!table.insert("a", hash_name("a"), noop()).unwrap());
        assert!(table.insert("a", hash_name("a"), noop()).unwrap());
        assert_eq!(table.len(), 1);
        assert_eq!(table.type_name(), "f32");
    }

    #[test]
    fn test_prepare_outcomes() {
        let mut table = TypedInputs::<Sink, f32>::new();
        table.insert("readTemp", hash_name("readTemp"), noop()).unwrap();

        let hit = Envelope::encode(&1.5f32, hash_name("readTemp"), Origin::Direct, Token(0)).unwrap();
        match table.prepare(&hit) {
            Prepared::Call { input_name, .. } => assert_eq!(&*input_name, "readTemp"),
            _ => panic!("expected a call"),
        }

        let miss = hit.readdressed(hash_name("other"));
        assert!(matches!(table.prepare(&miss), Prepared::Missing));

        let wrong = Envelope::encode(&1u64, hash_name("readTemp"), Origin::Direct, Token(0)).unwrap();
        assert!(matches!(table.prepare(&wrong), Prepared::Mismatch(_)));

        // Right tag, bytes too short for an f32.
        let mut truncated = hit.clone();
        truncated.payload.truncate(1);
        assert!(matches!(table.prepare(&truncated), Prepared::Mismatch(_)));
    }

    #[test]
    fn test_names_sorted() {
        let mut table = TypedInputs::<Sink, f32>::new();
        for name in ["b", "c", "a"] {
            table.insert(name, hash_name(name), noop()).unwrap();
        }
        let names: Vec<String> = table.names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(table.remove("a"));
        assert!(!table.remove("a"));
        assert!(table.contains("b"));
    }

    #[test]
    fn test_colliding_name_is_refused() {
        // "plumless" and "buckeroo" share a CRC-32.
        assert_eq!(hash_name("plumless"), hash_name("buckeroo"));
        let mut table = TypedInputs::<Sink, f32>::new();
        table.insert("plumless", hash_name("plumless"), noop()).unwrap();

        let err = table
            .insert("buckeroo", hash_name("buckeroo"), noop())
            .unwrap_err();
        assert!(matches!(err, PartError::NameCollision { ref existing, .. } if existing == "plumless"));
        assert_eq!(table.len(), 1);
        assert_eq!(&*table.names()[0], "plumless");
        assert!(!table.remove("buckeroo"));
        assert!(table.contains("plumless"));
        assert!(!table.contains("buckeroo"));
    }
}
