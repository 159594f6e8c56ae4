//! Parts: user behavior plus the port machinery that drives it.
//!
//! A [`Part`] pairs a [`Behavior`] (the user's state and hooks) with a
//! [`PartIo`] (ports, token, runtime handle). The host feeds it one
//! [`Mail`] at a time through [`Part::deliver`]; each item is processed to
//! completion, including any sends it triggers and the trailing `do_work`.

mod io;

pub use io::PartIo;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::core::config::PartConfig;
use crate::core::errors::Result;
use crate::core::hashing::NameHash;
use crate::messaging::envelope::{Envelope, Mail, Origin, Token};
use crate::messaging::sync::{RequestId, SyncReply, SyncRequest};
use crate::ports::dispatch::Prepared;
use crate::ports::link::LinkControl;
use crate::ports::registry::PortListing;
use crate::runtime::{Address, Runtime};

/// Initial token and domain master handed to a Part at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub token: Token,
    pub master: Address,
}

impl Domain {
    pub fn new(token: Token, master: Address) -> Self {
        Self { token, master }
    }
}

/// Facts about the input currently being handled.
#[derive(Debug, Clone, PartialEq)]
pub struct InputContext {
    pub from: Address,
    pub token: Token,
    pub input: NameHash,
    pub input_name: Arc<str>,
    pub origin: Origin,
}

/// What became of one mailbox item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran, then `do_work`.
    Delivered,
    /// No input of that name for the payload type; only `do_work` ran.
    Missed,
    /// Token gate dropped the envelope.
    Rejected,
    /// No dispatcher for the payload type.
    Unrouted,
    /// Payload did not decode as the dispatcher's type.
    Mismatched,
    Linked { applied: bool },
    Synced,
    /// Sync reply or port diagnostics.
    Control,
}

impl DispatchOutcome {
    /// Whether `do_work` ran for this item.
    pub fn did_work(self) -> bool {
        matches!(
            self,
            DispatchOutcome::Delivered | DispatchOutcome::Missed | DispatchOutcome::Synced
        )
    }
}

/// User state and lifecycle hooks of a Part.
///
/// Every hook gets the Part's [`PartIo`] so it can write outputs and edit
/// its own ports. All hooks except `setup` default to doing nothing.
pub trait Behavior: Send + Sized + 'static {
    /// Register ports. Runs once when the Part is built; an error aborts
    /// construction.
    fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()>;

    /// Runs after every input that passed the token gate and after every
    /// sync request.
    fn do_work(&mut self, _io: &mut PartIo<Self>) {}

    /// Runs on a sync request asking for a reset, after any token change.
    fn reset(&mut self, _io: &mut PartIo<Self>) {}

    fn token_changed(&mut self, _io: &mut PartIo<Self>, _token: Token) {}

    /// A Part answered a sync request this Part issued.
    fn sync_replied(&mut self, _io: &mut PartIo<Self>, _from: Address, _reply: &SyncReply) {}

    /// Every target of an issued sync request has answered. Runs after
    /// `sync_replied` for the last reply.
    fn sync_completed(
        &mut self,
        _io: &mut PartIo<Self>,
        _request: RequestId,
        _replies: &[(Address, Token)],
    ) {
    }

    fn port_listing(&mut self, _io: &mut PartIo<Self>, _from: Address, _listing: PortListing) {}
}

pub struct Part<B: Behavior> {
    behavior: B,
    io: PartIo<B>,
}

impl<B: Behavior> Part<B> {
    /// Build a Part and run its `setup` hook.
    pub fn new(
        address: Address,
        mut behavior: B,
        config: &PartConfig,
        domain: &Domain,
        runtime: Arc<dyn Runtime>,
    ) -> Result<Self> {
        let mut io = PartIo::new(address, config, domain, runtime);
        behavior.setup(&mut io)?;
        debug!(part = %io.name, %address, token = %io.token, "part ready");
        Ok(Self { behavior, io })
    }

    pub fn address(&self) -> Address {
        self.io.address
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    pub fn io(&self) -> &PartIo<B> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut PartIo<B> {
        &mut self.io
    }

    /// Run a closure with both halves borrowed, as a handler would.
    pub fn with<R>(&mut self, f: impl FnOnce(&mut B, &mut PartIo<B>) -> R) -> R {
        f(&mut self.behavior, &mut self.io)
    }

    pub fn into_behavior(self) -> B {
        self.behavior
    }

    /// Process one mailbox item to completion.
    pub fn deliver(&mut self, from: Address, mail: Mail) -> DispatchOutcome {
        match mail {
            Mail::Input(envelope) => self.dispatch_input(from, envelope),
            Mail::Link(control) => self.apply_link_control(from, &control),
            Mail::Sync(request) => self.apply_sync(from, &request),
            Mail::SyncReply(reply) => {
                let complete = self.io.sync.record(from, &reply);
                trace!(part = %self.io.name, %from, request = reply.request_id, complete, "sync reply");
                self.behavior.sync_replied(&mut self.io, from, &reply);
                if complete {
                    let replies = self.io.sync.replies(reply.request_id).to_vec();
                    self.behavior
                        .sync_completed(&mut self.io, reply.request_id, &replies);
                }
                DispatchOutcome::Control
            }
            Mail::PortQuery => {
                let listing = self.io.listing();
                if !self.io.runtime.send(self.io.address, from, Mail::PortListing(listing)) {
                    warn!(part = %self.io.name, to = %from, "port listing refused");
                }
                DispatchOutcome::Control
            }
            Mail::PortListing(listing) => {
                self.behavior.port_listing(&mut self.io, from, listing);
                DispatchOutcome::Control
            }
        }
    }

    fn dispatch_input(&mut self, from: Address, envelope: Envelope) -> DispatchOutcome {
        let Some(dispatch) = self.io.registry.input_dispatch(envelope.type_tag) else {
            trace!(part = %self.io.name, tag = %envelope.type_tag, "no dispatcher for tag");
            return DispatchOutcome::Unrouted;
        };

        if self.io.token_check && envelope.token != self.io.token {
            trace!(
                part = %self.io.name,
                token = %envelope.token,
                expected = %self.io.token,
                "token gate"
            );
            return DispatchOutcome::Rejected;
        }

        match dispatch.prepare(&envelope) {
            Prepared::Missing => {
                trace!(part = %self.io.name, input = %envelope.input, "no such input");
                self.behavior.do_work(&mut self.io);
                DispatchOutcome::Missed
            }
            Prepared::Mismatch(reason) => {
                warn!(
                    part = %self.io.name,
                    tag = %envelope.type_tag,
                    input = %envelope.input,
                    %reason,
                    "payload type mismatch"
                );
                DispatchOutcome::Mismatched
            }
            Prepared::Call { input_name, call } => {
                let ctx = InputContext {
                    from,
                    token: envelope.token,
                    input: envelope.input,
                    input_name,
                    origin: envelope.origin,
                };
                call(&mut self.behavior, &mut self.io, &ctx);
                self.behavior.do_work(&mut self.io);
                DispatchOutcome::Delivered
            }
        }
    }

    fn apply_link_control(&mut self, from: Address, control: &LinkControl) -> DispatchOutcome {
        let applied = self.io.registry.apply_link_control(control);
        debug!(
            part = %self.io.name,
            %from,
            op = ?control.op,
            output = %control.output,
            to = %control.subscriber,
            applied,
            "link control"
        );
        DispatchOutcome::Linked { applied }
    }

    /// Master, then token, then reset, then reply, then `do_work`.
    fn apply_sync(&mut self, from: Address, request: &SyncRequest) -> DispatchOutcome {
        if request.change_master {
            self.io.master = request.new_master;
        }
        if request.change_token {
            self.io.token = request.new_token;
            self.behavior.token_changed(&mut self.io, request.new_token);
        }
        if request.reset_state {
            self.behavior.reset(&mut self.io);
        }

        let reply = SyncReply {
            request_id: request.request_id,
            token: self.io.token,
        };
        if !self.io.runtime.send(self.io.address, from, Mail::SyncReply(reply)) {
            warn!(part = %self.io.name, to = %from, request = request.request_id, "sync reply refused");
        }
        info!(
            part = %self.io.name,
            request = request.request_id,
            token = %self.io.token,
            master = %self.io.master,
            reset = request.reset_state,
            "sync applied"
        );

        self.behavior.do_work(&mut self.io);
        DispatchOutcome::Synced
    }
}
