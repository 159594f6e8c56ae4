use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::core::config::PartConfig;
use crate::core::errors::Result;
use crate::core::hashing::{hash_name, NameHash};
use crate::messaging::envelope::{Envelope, Mail, Origin, Payload, Token};
use crate::messaging::sync::{RequestId, SyncRequest, SyncTracker, COMPLETED_HISTORY};
use crate::part::{Domain, InputContext};
use crate::ports::dispatch::InputHandler;
use crate::ports::link::{Link, Subscriber};
use crate::ports::registry::{PortInfo, PortListing, PortRegistry};
use crate::runtime::{Address, Runtime};

/// Everything a Part's hooks and handlers may touch besides their own state.
///
/// Owns the port registry, the token and domain master, the issued-sync
/// bookkeeping and the runtime handle used for every outbound message.
pub struct PartIo<B> {
    pub(crate) address: Address,
    pub(crate) name: String,
    pub(crate) token: Token,
    pub(crate) master: Address,
    pub(crate) token_check: bool,
    pub(crate) registry: PortRegistry<B>,
    pub(crate) sync: SyncTracker,
    pub(crate) runtime: Arc<dyn Runtime>,
}

impl<B: 'static> PartIo<B> {
    pub fn new(address: Address, config: &PartConfig, domain: &Domain, runtime: Arc<dyn Runtime>) -> Self {
        Self {
            address,
            name: config.name.clone(),
            token: domain.token,
            master: domain.master,
            token_check: config.token_check,
            registry: PortRegistry::new(address, config.name.clone()),
            sync: SyncTracker::new(),
            runtime,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn domain_master(&self) -> Address {
        self.master
    }

    pub fn token_check(&self) -> bool {
        self.token_check
    }

    pub fn set_token_check(&mut self, enabled: bool) {
        self.token_check = enabled;
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn registry(&self) -> &PortRegistry<B> {
        &self.registry
    }

    // ---- ports ----

    /// Register `handler` for the input `name`. Returns `true` if it
    /// replaced an earlier handler of the same name.
    ///
    /// Fails with [`PartError::Indeterminate`](crate::PartError) when the
    /// runtime will not hook the dispatcher for `T`; the Part should then
    /// be discarded.
    pub fn add_input_port<T, F>(&mut self, name: &str, handler: F) -> Result<bool>
    where
        T: Payload,
        F: Fn(&mut B, &mut PartIo<B>, &InputContext, T) + Send + Sync + 'static,
    {
        let handler: InputHandler<B, T> = Arc::new(handler);
        let replaced = self
            .registry
            .add_input::<T>(self.runtime.as_ref(), name, handler)?;
        debug!(part = %self.name, input = name, type_name = T::TYPE_NAME, replaced, "input port added");
        Ok(replaced)
    }

    pub fn remove_input_port<T: Payload>(&mut self, name: &str) -> bool {
        let removed = self.registry.remove_input::<T>(self.runtime.as_ref(), name);
        if removed {
            debug!(part = %self.name, input = name, "input port removed");
        }
        removed
    }

    pub fn add_output_port<T: Payload>(&mut self, name: &str) -> bool {
        let added = self.registry.add_output::<T>(name);
        if added {
            debug!(part = %self.name, output = name, type_name = T::TYPE_NAME, "output port added");
        }
        added
    }

    /// Drop the output and its links. Subscribers are not notified and
    /// simply stop receiving.
    pub fn remove_output_port<T: Payload>(&mut self, name: &str) -> bool {
        self.registry.remove_output::<T>(name)
    }

    pub fn add_link<T: Payload>(&mut self, output: &str, input: &str, to: Address) -> bool {
        let added = self.registry.add_link(T::type_tag(), Link::new(output, input, to));
        debug!(part = %self.name, output, input, %to, added, "add link");
        added
    }

    pub fn remove_link<T: Payload>(&mut self, output: &str, input: &str, to: Address) -> bool {
        let removed = self
            .registry
            .remove_link(T::type_tag(), Link::new(output, input, to));
        debug!(part = %self.name, output, input, %to, removed, "remove link");
        removed
    }

    /// Current subscribers of `output`, in fan-out order.
    pub fn links<T: Payload>(&self, output: &str) -> &[Subscriber] {
        self.registry
            .output(T::type_tag(), hash_name(output))
            .map(|port| port.subscribers())
            .unwrap_or(&[])
    }

    // ---- outbound ----

    /// Fan `value` out to every subscriber of `output`, stamped with the
    /// current token.
    pub fn write_to_output<T: Payload>(&self, output: &str, value: &T) -> bool {
        self.write_to_output_hashed(hash_name(output), value, self.token)
    }

    pub fn write_to_output_with_token<T: Payload>(&self, output: &str, value: &T, token: Token) -> bool {
        self.write_to_output_hashed(hash_name(output), value, token)
    }

    /// Returns `false` if the output does not exist or the value does not
    /// encode. Individual sends are fire-and-forget; a refused one is
    /// logged and skipped.
    pub fn write_to_output_hashed<T: Payload>(&self, output: NameHash, value: &T, token: Token) -> bool {
        let Some(port) = self.registry.output(T::type_tag(), output) else {
            trace!(part = %self.name, %output, "write to unknown output");
            return false;
        };
        if port.subscribers().is_empty() {
            return true;
        }
        let envelope = match Envelope::encode(value, output, Origin::Output(output), token) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(part = %self.name, output = port.name(), error = %err, "payload did not encode");
                return false;
            }
        };
        for subscriber in port.subscribers() {
            let mail = Mail::Input(envelope.readdressed(subscriber.input));
            if !self.runtime.send(self.address, subscriber.address, mail) {
                warn!(
                    part = %self.name,
                    output = port.name(),
                    to = %subscriber.address,
                    "send refused"
                );
            }
        }
        true
    }

    /// Point-to-point send that bypasses the subscriber lists.
    pub fn send_to_input<T: Payload>(&self, to: Address, input: &str, value: &T, token: Token) -> bool {
        self.send_to_input_hashed(to, hash_name(input), value, token)
    }

    pub fn send_to_input_hashed<T: Payload>(
        &self,
        to: Address,
        input: NameHash,
        value: &T,
        token: Token,
    ) -> bool {
        match Envelope::encode(value, input, Origin::Direct, token) {
            Ok(envelope) => self.runtime.send(self.address, to, Mail::Input(envelope)),
            Err(err) => {
                warn!(part = %self.name, error = %err, "payload did not encode");
                false
            }
        }
    }

    // ---- synchronization (issuing side) ----

    /// Broadcast a sync request to `targets` and start tracking replies.
    ///
    /// `build` receives a request carrying a fresh id and sets the fields
    /// to apply.
    pub fn issue_sync<F>(&mut self, targets: &[Address], build: F) -> RequestId
    where
        F: FnOnce(SyncRequest) -> SyncRequest,
    {
        let id = self.sync.next_request_id();
        let mut request = build(SyncRequest::new(id));
        request.request_id = id;
        self.sync.track(id, targets.iter().copied());
        for &target in targets {
            if !self.runtime.send(self.address, target, Mail::Sync(request.clone())) {
                warn!(part = %self.name, to = %target, request = id, "sync request refused");
            }
        }
        debug!(part = %self.name, request = id, targets = targets.len(), "sync issued");
        id
    }

    pub fn issue_reset(&mut self, targets: &[Address]) -> RequestId {
        self.issue_sync(targets, SyncRequest::with_reset)
    }

    pub fn issue_new_token(&mut self, targets: &[Address], token: Token) -> RequestId {
        self.issue_sync(targets, |request| request.with_token(token))
    }

    pub fn issue_master_change(&mut self, targets: &[Address], master: Address) -> RequestId {
        self.issue_sync(targets, |request| request.with_master(master))
    }

    /// Whether every target of `id` answered. Completed requests are only
    /// remembered for the last [`COMPLETED_HISTORY`] completions.
    pub fn sync_complete(&self, id: RequestId) -> bool {
        self.sync.is_complete(id)
    }

    /// Issued requests still waiting for a reply.
    pub fn pending_syncs(&self) -> usize {
        self.sync.pending_count()
    }

    pub fn sync_replies(&self, id: RequestId) -> &[(Address, Token)] {
        self.sync.replies(id)
    }

    pub fn forget_sync(&mut self, id: RequestId) -> Option<Vec<(Address, Token)>> {
        self.sync.forget(id)
    }

    // ---- diagnostics ----

    pub fn input_ports(&self) -> Vec<PortInfo> {
        self.registry.input_ports()
    }

    pub fn output_ports(&self) -> Vec<PortInfo> {
        self.registry.output_ports()
    }

    pub fn listing(&self) -> PortListing {
        self.registry.listing()
    }

    /// Ask another Part for its port listing. The answer arrives as
    /// `Mail::PortListing` and is handed to `Behavior::port_listing`.
    pub fn request_ports(&self, to: Address) -> bool {
        self.runtime.send(self.address, to, Mail::PortQuery)
    }
}
