//! Synchronization messages and the issuing side's bookkeeping.
//!
//! A domain master broadcasts [`SyncRequest`]s to change the shared token,
//! move the master role, or reset Part state. Every receiving Part answers
//! with a [`SyncReply`] carrying the token it holds after applying the
//! request. Retrying unanswered requests is left to the caller.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::messaging::envelope::Token;
use crate::runtime::Address;

/// Correlates a reply with the request it answers.
pub type RequestId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub request_id: RequestId,
    pub reset_state: bool,
    pub change_token: bool,
    pub new_token: Token,
    pub change_master: bool,
    pub new_master: Address,
}

impl SyncRequest {
    /// A request that changes nothing; the reply still reports the token.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            reset_state: false,
            change_token: false,
            new_token: Token::default(),
            change_master: false,
            new_master: Address::EXTERNAL,
        }
    }

    pub fn with_reset(mut self) -> Self {
        self.reset_state = true;
        self
    }

    pub fn with_token(mut self, token: Token) -> Self {
        self.change_token = true;
        self.new_token = token;
        self
    }

    pub fn with_master(mut self, master: Address) -> Self {
        self.change_master = true;
        self.new_master = master;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReply {
    pub request_id: RequestId,
    pub token: Token,
}

/// Completed requests whose replies stay readable after completion.
pub const COMPLETED_HISTORY: usize = 32;

#[derive(Debug, Default)]
struct PendingSync {
    awaiting: HashSet<Address>,
    replies: Vec<(Address, Token)>,
}

/// Tracks requests this Part has issued and the replies received so far.
///
/// A request leaves the pending set as soon as its last target answers and
/// joins a short history of completed requests, bounded by
/// [`COMPLETED_HISTORY`]. Requests that are never fully answered stay
/// pending until forgotten or until their id is reused.
#[derive(Debug, Default)]
pub struct SyncTracker {
    next_id: RequestId,
    pending: HashMap<RequestId, PendingSync>,
    completed: VecDeque<(RequestId, Vec<(Address, Token)>)>,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next request id.
    pub fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Remember that `id` was sent to `targets`, replacing anything
    /// previously tracked under the same id.
    pub fn track(&mut self, id: RequestId, targets: impl IntoIterator<Item = Address>) {
        self.completed.retain(|(done, _)| *done != id);
        let awaiting: HashSet<Address> = targets.into_iter().collect();
        if awaiting.is_empty() {
            self.pending.remove(&id);
            self.complete(id, Vec::new());
            return;
        }
        self.pending.insert(
            id,
            PendingSync {
                awaiting,
                replies: Vec::new(),
            },
        );
    }

    /// Record a reply. Returns `true` if it completed the request.
    ///
    /// Replies for unknown requests or from Parts that were not asked are
    /// ignored.
    pub fn record(&mut self, from: Address, reply: &SyncReply) -> bool {
        let Some(pending) = self.pending.get_mut(&reply.request_id) else {
            return false;
        };
        if !pending.awaiting.remove(&from) {
            return false;
        }
        pending.replies.push((from, reply.token));
        if !pending.awaiting.is_empty() {
            return false;
        }
        if let Some(done) = self.pending.remove(&reply.request_id) {
            self.complete(reply.request_id, done.replies);
        }
        true
    }

    fn complete(&mut self, id: RequestId, replies: Vec<(Address, Token)>) {
        if self.completed.len() == COMPLETED_HISTORY {
            self.completed.pop_front();
        }
        self.completed.push_back((id, replies));
    }

    /// Whether every target of `id` has replied. Unknown ids, and ids that
    /// have aged out of the completed history, are not complete.
    pub fn is_complete(&self, id: RequestId) -> bool {
        self.completed.iter().any(|(done, _)| *done == id)
    }

    /// Replies received so far for `id`, in arrival order.
    pub fn replies(&self, id: RequestId) -> &[(Address, Token)] {
        if let Some(pending) = self.pending.get(&id) {
            return &pending.replies;
        }
        self.completed
            .iter()
            .find(|(done, _)| *done == id)
            .map(|(_, replies)| replies.as_slice())
            .unwrap_or(&[])
    }

    /// Requests still waiting for at least one reply.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Forget a request, returning the replies collected for it.
    pub fn forget(&mut self, id: RequestId) -> Option<Vec<(Address, Token)>> {
        if let Some(pending) = self.pending.remove(&id) {
            return Some(pending.replies);
        }
        let index = self.completed.iter().position(|(done, _)| *done == id)?;
        self.completed.remove(index).map(|(_, replies)| replies)
    }
}
