//! Synchronization: applying requests on the receiving side and tracking
//! replies on the issuing side.

use partwire::core::logging::init_test_tracing;
use partwire::{
    hash_name, Address, Behavior, DispatchOutcome, Domain, Envelope, InputContext, LocalRuntime,
    Mail, Origin, Part, PartConfig, PartIo, RecordingRuntime, RequestId, Result, RuntimeConfig,
    SyncReply, SyncRequest, Token,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Logs hook calls in order, with the token seen by each.
#[derive(Default)]
struct Journal {
    events: Vec<String>,
    total: i64,
    completed: Vec<(RequestId, usize)>,
}

impl Behavior for Journal {
    fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()> {
        io.add_input_port("add", |this: &mut Self, _: &mut PartIo<Self>, _: &InputContext, n: i64| {
            this.total += n;
        })?;
        Ok(())
    }

    fn do_work(&mut self, io: &mut PartIo<Self>) {
        self.events.push(format!("work@{}", io.token()));
    }

    fn reset(&mut self, io: &mut PartIo<Self>) {
        self.total = 0;
        self.events.push(format!("reset@{}", io.token()));
    }

    fn token_changed(&mut self, _io: &mut PartIo<Self>, token: Token) {
        self.events.push(format!("token={}", token));
    }

    fn sync_completed(&mut self, _io: &mut PartIo<Self>, request: RequestId, replies: &[(Address, Token)]) {
        self.completed.push((request, replies.len()));
    }
}

fn add(n: i64, token: i64) -> Mail {
    Mail::Input(Envelope::encode(&n, hash_name("add"), Origin::Direct, Token(token)).unwrap())
}

fn journal(token: i64) -> (Arc<RecordingRuntime>, Part<Journal>) {
    init_test_tracing();
    let runtime = RecordingRuntime::new();
    let part = Part::new(
        runtime.allocate(),
        Journal::default(),
        &PartConfig::named("journal"),
        &Domain::new(Token(token), Address(50)),
        runtime.clone(),
    )
    .unwrap();
    (runtime, part)
}

fn followers(runtime: &Arc<RecordingRuntime>, master: Address, n: usize) -> Vec<Part<Journal>> {
    (0..n)
        .map(|_| {
            Part::new(
                runtime.allocate(),
                Journal::default(),
                &PartConfig::named("follower"),
                &Domain::new(Token(0), master),
                runtime.clone(),
            )
            .unwrap()
        })
        .collect()
}

/// Deliver everything queued for each of `parts`.
fn drain(runtime: &RecordingRuntime, parts: &mut [Part<Journal>]) {
    for part in parts {
        for delivery in runtime.take_for(part.address()) {
            part.deliver(delivery.from, delivery.mail);
        }
    }
}

#[test]
fn test_reset_sees_new_token() {
    let (runtime, mut part) = journal(1);
    part.deliver(Address(50), add(4, 1));
    assert_eq!(part.behavior().total, 4);

    let request = SyncRequest::new(1).with_token(Token(9)).with_reset();
    assert_eq!(part.deliver(Address(50), Mail::Sync(request)), DispatchOutcome::Synced);

    assert_eq!(part.behavior().total, 0);
    assert_eq!(
        part.behavior().events,
        vec!["work@1", "token=9", "reset@9", "work@9"]
    );
    let reply = runtime.take_for(Address(50));
    assert_eq!(
        reply[0].mail,
        Mail::SyncReply(SyncReply { request_id: 1, token: Token(9) })
    );
}

#[test]
fn test_inputs_follow_the_new_token() {
    let (_runtime, mut part) = journal(1);
    part.deliver(Address(50), Mail::Sync(SyncRequest::new(2).with_token(Token(2))));

    assert_eq!(part.deliver(Address(50), add(5, 1)), DispatchOutcome::Rejected);
    assert_eq!(part.deliver(Address(50), add(5, 2)), DispatchOutcome::Delivered);
    assert_eq!(part.behavior().total, 5);
}

#[test]
fn test_master_change_without_token() {
    let (runtime, mut part) = journal(3);
    let request = SyncRequest::new(7).with_master(Address(60));
    part.deliver(Address(50), Mail::Sync(request));

    assert_eq!(part.io().domain_master(), Address(60));
    assert_eq!(part.io().token(), Token(3));
    assert_eq!(part.behavior().events, vec!["work@3"]);
    // The reply goes to whoever asked, not to the new master.
    assert_eq!(runtime.take_for(Address(50)).len(), 1);
    assert!(runtime.take_for(Address(60)).is_empty());
}

#[test]
fn test_master_tracks_replies() {
    let (runtime, mut master) = journal(0);
    let mut group = followers(&runtime, master.address(), 3);
    let targets: Vec<Address> = group.iter().map(|p| p.address()).collect();

    let id = master.io_mut().issue_new_token(&targets, Token(11));
    for follower in &mut group {
        for delivery in runtime.take_for(follower.address()) {
            follower.deliver(delivery.from, delivery.mail);
        }
        assert_eq!(follower.io().token(), Token(11));
    }

    assert!(!master.io().sync_complete(id));
    for delivery in runtime.take_for(master.address()) {
        master.deliver(delivery.from, delivery.mail);
    }
    assert!(master.io().sync_complete(id));
    let tokens: Vec<Token> = master.io().sync_replies(id).iter().map(|(_, t)| *t).collect();
    assert_eq!(tokens, vec![Token(11); 3]);

    let again = master.io_mut().issue_reset(&targets);
    assert_ne!(again, id);
    assert_eq!(master.io_mut().forget_sync(id).map(|r| r.len()), Some(3));
}

#[test]
fn test_master_change_moves_followers() {
    let (runtime, mut master) = journal(0);
    let mut group = followers(&runtime, master.address(), 2);
    let targets: Vec<Address> = group.iter().map(|p| p.address()).collect();
    let successor = runtime.allocate();

    let id = master.io_mut().issue_master_change(&targets, successor);
    drain(&runtime, &mut group);
    for follower in &group {
        assert_eq!(follower.io().domain_master(), successor);
        assert_eq!(follower.io().token(), Token(0));
    }

    // Replies still go to the Part that asked.
    assert!(runtime.take_for(successor).is_empty());
    drain(&runtime, std::slice::from_mut(&mut master));
    assert!(master.io().sync_complete(id));
    assert_eq!(master.behavior().completed, vec![(id, 2)]);
}

#[test]
fn test_answered_requests_are_released() {
    let (runtime, mut master) = journal(0);
    let mut group = followers(&runtime, master.address(), 1);
    let targets = vec![group[0].address()];

    let mut last = 0;
    for _ in 0..1000 {
        last = master.io_mut().issue_reset(&targets);
        drain(&runtime, &mut group);
        drain(&runtime, std::slice::from_mut(&mut master));
    }

    assert_eq!(master.io().pending_syncs(), 0);
    assert_eq!(master.behavior().completed.len(), 1000);
    assert!(master.io().sync_complete(last));
    assert_eq!(master.io().sync_replies(last).len(), 1);
    // Old completions age out of the history.
    assert!(!master.io().sync_complete(1));
    assert!(master.io().sync_replies(1).is_empty());

    let waiting = master.io_mut().issue_reset(&targets);
    assert_eq!(master.io().pending_syncs(), 1);
    assert!(!master.io().sync_complete(waiting));
}

#[tokio::test]
async fn test_sync_through_local_runtime() {
    init_test_tracing();
    let runtime = LocalRuntime::new(RuntimeConfig::development()).unwrap();
    let (master, mut inbox) = runtime.open_inbox();
    let handle = runtime
        .spawn(Journal::default(), PartConfig::named("journal"), &Domain::new(Token(1), master))
        .unwrap();

    let request = SyncRequest::new(42).with_token(Token(8)).with_reset();
    assert!(handle.send_from(master, Mail::Sync(request)));

    let reply = inbox.recv().await.unwrap();
    assert_eq!(reply.from, handle.address());
    assert_eq!(
        reply.mail,
        Mail::SyncReply(SyncReply { request_id: 42, token: Token(8) })
    );

    assert!(handle.send(add(3, 8)));
    let journal = handle.stop().await.unwrap();
    assert_eq!(journal.total, 3);
    assert_eq!(journal.events, vec!["token=8", "reset@8", "work@8", "work@8"]);
}
