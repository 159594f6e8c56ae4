//! In-process runtime hosting each Part on its own tokio task.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::core::config::{PartConfig, RuntimeConfig};
use crate::core::errors::{PartError, Result};
use crate::core::hashing::TypeTag;
use crate::messaging::envelope::{Delivery, Mail};
use crate::part::{Behavior, Domain, Part};
use crate::runtime::{Address, Runtime};

struct Inner {
    config: RuntimeConfig,
    next_address: AtomicU64,
    mailboxes: DashMap<Address, mpsc::Sender<Delivery>>,
    // Present for hosted Parts only; inboxes accept any mail.
    hooks: DashMap<Address, HashSet<TypeTag>>,
}

/// Hosts Parts on tokio tasks with one bounded mailbox each.
///
/// Sends never block: a full, closed or unknown mailbox refuses the mail
/// and `send` returns `false`. Input mail for a payload type the target
/// Part never hooked is refused the same way.
#[derive(Clone)]
pub struct LocalRuntime {
    inner: Arc<Inner>,
}

impl LocalRuntime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                next_address: AtomicU64::new(1),
                mailboxes: DashMap::new(),
                hooks: DashMap::new(),
            }),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    fn allocate(&self) -> (Address, mpsc::Receiver<Delivery>) {
        let address = Address(self.inner.next_address.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.config.mailbox_capacity);
        self.inner.mailboxes.insert(address, tx);
        (address, rx)
    }

    /// Build a Part and start draining its mailbox. Must be called from
    /// within a tokio runtime.
    pub fn spawn<B: Behavior>(&self, behavior: B, config: PartConfig, domain: &Domain) -> Result<PartHandle<B>> {
        let (address, mut rx) = self.allocate();
        self.inner.hooks.insert(address, HashSet::new());

        let runtime: Arc<dyn Runtime> = Arc::new(self.clone());
        let mut part = match Part::new(address, behavior, &config, domain, runtime) {
            Ok(part) => part,
            Err(err) => {
                self.release(address);
                return Err(err);
            }
        };

        let name = config.name;
        let task_name = name.clone();
        let join = tokio::spawn(async move {
            while let Some(Delivery { from, mail }) = rx.recv().await {
                let kind = mail.kind();
                let outcome = part.deliver(from, mail);
                trace!(part = %task_name, %from, kind, ?outcome, "delivered");
            }
            debug!(part = %task_name, "mailbox closed");
            part
        });

        debug!(part = %name, %address, "part spawned");
        Ok(PartHandle {
            address,
            name,
            runtime: self.clone(),
            join,
        })
    }

    /// Spawn with the settings configured under `name`.
    pub fn spawn_named<B: Behavior>(&self, name: &str, behavior: B, domain: &Domain) -> Result<PartHandle<B>> {
        self.spawn(behavior, self.inner.config.part(name), domain)
    }

    /// Mailbox for something that is not a Part, such as a test observer or
    /// a domain master driven by hand.
    pub fn open_inbox(&self) -> (Address, mpsc::Receiver<Delivery>) {
        self.allocate()
    }

    /// Close `address`'s mailbox. Mail already queued is still drained.
    pub fn release(&self, address: Address) -> bool {
        self.inner.hooks.remove(&address);
        self.inner.mailboxes.remove(&address).is_some()
    }

    pub fn is_open(&self, address: Address) -> bool {
        self.inner.mailboxes.contains_key(&address)
    }

    /// Close every mailbox.
    pub fn shutdown(&self) {
        self.inner.mailboxes.clear();
        self.inner.hooks.clear();
    }
}

impl Runtime for LocalRuntime {
    fn send(&self, from: Address, to: Address, mail: Mail) -> bool {
        if let Mail::Input(envelope) = &mail {
            if let Some(tags) = self.inner.hooks.get(&to) {
                if !tags.contains(&envelope.type_tag) {
                    debug!(%from, %to, tag = %envelope.type_tag, "no dispatcher hooked, mail refused");
                    return false;
                }
            }
        }

        let Some(mailbox) = self.inner.mailboxes.get(&to) else {
            warn!(%from, %to, kind = mail.kind(), "unknown address");
            return false;
        };
        match mailbox.try_send(Delivery { from, mail }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(delivery)) => {
                warn!(%from, %to, kind = delivery.mail.kind(), "mailbox full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(delivery)) => {
                warn!(%from, %to, kind = delivery.mail.kind(), "mailbox closed");
                false
            }
        }
    }

    fn register_handler(&self, owner: Address, tag: TypeTag) -> bool {
        match self.inner.hooks.get_mut(&owner) {
            Some(mut tags) => {
                tags.insert(tag);
                true
            }
            None => false,
        }
    }

    fn deregister_handler(&self, owner: Address, tag: TypeTag) -> bool {
        self.inner
            .hooks
            .get_mut(&owner)
            .map(|mut tags| tags.remove(&tag))
            .unwrap_or(false)
    }

    fn is_handler_registered(&self, owner: Address, tag: TypeTag) -> bool {
        self.inner
            .hooks
            .get(&owner)
            .map(|tags| tags.contains(&tag))
            .unwrap_or(false)
    }
}

/// Owner's handle on a spawned Part.
pub struct PartHandle<B: Behavior> {
    address: Address,
    name: String,
    runtime: LocalRuntime,
    join: JoinHandle<Part<B>>,
}

impl<B: Behavior> PartHandle<B> {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post mail as if from outside any Part.
    pub fn send(&self, mail: Mail) -> bool {
        self.runtime.send(Address::EXTERNAL, self.address, mail)
    }

    pub fn send_from(&self, from: Address, mail: Mail) -> bool {
        self.runtime.send(from, self.address, mail)
    }

    /// Close the mailbox, wait for the queued mail to drain and hand back
    /// the Part.
    pub async fn stop_part(self) -> Result<Part<B>> {
        self.runtime.release(self.address);
        let name = self.name;
        self.join
            .await
            .map_err(|err| PartError::runtime(format!("part '{}' task failed: {}", name, err)))
    }

    /// Like [`stop_part`](Self::stop_part), keeping only the behavior.
    pub async fn stop(self) -> Result<B> {
        Ok(self.stop_part().await?.into_behavior())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hashing::hash_name;
    use crate::messaging::envelope::{Envelope, Origin, Token};
    use crate::part::{InputContext, PartIo};

    #[derive(Default)]
    struct Counter {
        total: u64,
    }

    impl Behavior for Counter {
        fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()> {
            io.add_input_port("add", |this: &mut Self, _: &mut PartIo<Self>, _: &InputContext, n: u64| {
                this.total += n;
            })?;
            Ok(())
        }
    }

    fn add(n: u64) -> Mail {
        Mail::Input(Envelope::encode(&n, hash_name("add"), Origin::Direct, Token(0)).unwrap())
    }

    #[tokio::test]
    async fn test_mailbox_drains_before_stop() {
        let runtime = LocalRuntime::new(RuntimeConfig::development()).unwrap();
        let handle = runtime
            .spawn(Counter::default(), PartConfig::named("counter"), &Domain::default())
            .unwrap();
        for n in 1..=10 {
            assert!(handle.send(add(n)));
        }
        let counter = handle.stop().await.unwrap();
        assert_eq!(counter.total, 55);
    }

    #[tokio::test]
    async fn test_full_mailbox_refuses() {
        let config = RuntimeConfig::builder().mailbox_capacity(1).build().unwrap();
        let runtime = LocalRuntime::new(config).unwrap();
        let (inbox, _rx) = runtime.open_inbox();

        assert!(runtime.send(Address::EXTERNAL, inbox, Mail::PortQuery));
        assert!(!runtime.send(Address::EXTERNAL, inbox, Mail::PortQuery));
        assert!(!runtime.send(Address::EXTERNAL, Address(999), Mail::PortQuery));

        runtime.release(inbox);
        assert!(!runtime.send(Address::EXTERNAL, inbox, Mail::PortQuery));
    }

    #[tokio::test]
    async fn test_unhooked_type_is_refused() {
        let runtime = LocalRuntime::new(RuntimeConfig::default()).unwrap();
        let handle = runtime
            .spawn(Counter::default(), PartConfig::named("counter"), &Domain::default())
            .unwrap();
        let wrong = Envelope::encode(&1.0f32, hash_name("add"), Origin::Direct, Token(0)).unwrap();
        assert!(!handle.send(Mail::Input(wrong)));
        assert!(runtime.is_handler_registered(handle.address(), TypeTag::of("u64")));
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_inbox_cannot_hook_handlers() {
        let runtime = LocalRuntime::new(RuntimeConfig::default()).unwrap();
        let (inbox, _rx) = runtime.open_inbox();
        assert!(!runtime.register_handler(inbox, TypeTag::of("u64")));
    }
}
