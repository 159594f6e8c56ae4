//! Parts hosted on the local runtime, wired together by link messages.

use partwire::core::logging::init_test_tracing;
use partwire::{
    hash_name, Address, Behavior, Direction, Domain, Envelope, InputContext, LinkControl,
    LocalRuntime, Mail, Origin, PartConfig, PartIo, PortInfo, Result, RuntimeConfig, Token,
};
use pretty_assertions::assert_eq;

/// Forwards whatever arrives on `setTemp` to its `temp` output.
struct Thermometer;

impl Behavior for Thermometer {
    fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()> {
        io.add_output_port::<f32>("temp");
        io.add_input_port("setTemp", |_: &mut Self, io: &mut PartIo<Self>, _: &InputContext, v: f32| {
            io.write_to_output("temp", &v);
        })?;
        Ok(())
    }
}

/// Keeps the last reading.
#[derive(Default)]
struct Display {
    last: Option<f32>,
    origin: Option<Origin>,
    from: Option<Address>,
    work: u32,
}

impl Behavior for Display {
    fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()> {
        io.add_input_port("readTemp", |this: &mut Self, _: &mut PartIo<Self>, ctx: &InputContext, v: f32| {
            this.last = Some(v);
            this.origin = Some(ctx.origin);
            this.from = Some(ctx.from);
        })?;
        Ok(())
    }

    fn do_work(&mut self, _io: &mut PartIo<Self>) {
        self.work += 1;
    }
}

/// Passes `forward` readings straight to one Part's `readTemp`, no links.
struct Relay {
    target: Address,
}

impl Behavior for Relay {
    fn setup(&mut self, io: &mut PartIo<Self>) -> Result<()> {
        io.add_input_port("forward", |this: &mut Self, io: &mut PartIo<Self>, _: &InputContext, v: f32| {
            io.send_to_input(this.target, "readTemp", &v, io.token());
        })?;
        Ok(())
    }
}

fn reading(input: &str, value: f32, token: i64) -> Mail {
    Mail::Input(Envelope::encode(&value, hash_name(input), Origin::Direct, Token(token)).unwrap())
}

fn runtime() -> LocalRuntime {
    init_test_tracing();
    LocalRuntime::new(RuntimeConfig::development()).unwrap()
}

#[tokio::test]
async fn test_linked_reading_reaches_display() {
    let runtime = runtime();
    let domain = Domain::new(Token(0), Address::EXTERNAL);
    let a = runtime.spawn(Thermometer, PartConfig::named("thermometer"), &domain).unwrap();
    let b = runtime.spawn(Display::default(), PartConfig::named("display"), &domain).unwrap();

    assert!(a.send(LinkControl::add::<f32>("temp", "readTemp", b.address()).into_mail()));
    assert!(a.send(reading("setTemp", 21.5, 0)));

    let a_address = a.address();
    a.stop().await.unwrap();
    let display = b.stop().await.unwrap();

    assert_eq!(display.last, Some(21.5));
    assert_eq!(display.work, 1);
    assert_eq!(display.from, Some(a_address));
    assert_eq!(display.origin, Some(Origin::Output(hash_name("temp"))));
}

#[tokio::test]
async fn test_wrong_token_never_reaches_handler() {
    let runtime = runtime();
    let display = runtime
        .spawn(Display::default(), PartConfig::named("display"), &Domain::new(Token(5), Address::EXTERNAL))
        .unwrap();

    assert!(display.send(reading("readTemp", 1.0, 3)));

    let display = display.stop().await.unwrap();
    assert_eq!(display.last, None);
    assert_eq!(display.work, 0);
}

#[tokio::test]
async fn test_token_check_can_be_disabled_by_config() {
    let config = RuntimeConfig::builder()
        .part(PartConfig::named("lenient").with_token_check(false))
        .build()
        .unwrap();
    init_test_tracing();
    let runtime = LocalRuntime::new(config).unwrap();
    let display = runtime
        .spawn_named("lenient", Display::default(), &Domain::new(Token(5), Address::EXTERNAL))
        .unwrap();

    assert!(display.send(reading("readTemp", 2.0, 3)));

    let display = display.stop().await.unwrap();
    assert_eq!(display.last, Some(2.0));
}

#[tokio::test]
async fn test_port_query_round_trip() {
    let runtime = runtime();
    let (observer, mut inbox) = runtime.open_inbox();
    let thermometer = runtime
        .spawn(Thermometer, PartConfig::named("thermometer"), &Domain::default())
        .unwrap();

    assert!(thermometer.send_from(observer, Mail::PortQuery));
    let answer = inbox.recv().await.unwrap();
    match answer.mail {
        Mail::PortListing(listing) => {
            assert_eq!(listing.part, "thermometer");
            assert_eq!(
                listing.inputs,
                vec![PortInfo {
                    name: "setTemp".into(),
                    type_name: "f32".into(),
                    direction: Direction::Input,
                }]
            );
            assert_eq!(listing.outputs[0].name, "temp");
        }
        other => panic!("unexpected {} mail", other.kind()),
    }
    thermometer.stop().await.unwrap();
}

#[tokio::test]
async fn test_fanout_to_several_displays() {
    let runtime = runtime();
    let domain = Domain::default();
    let source = runtime.spawn(Thermometer, PartConfig::named("thermometer"), &domain).unwrap();
    let displays: Vec<_> = (0..3)
        .map(|i| {
            runtime
                .spawn(Display::default(), PartConfig::named(format!("display-{}", i)), &domain)
                .unwrap()
        })
        .collect();

    for display in &displays {
        source.send(LinkControl::add::<f32>("temp", "readTemp", display.address()).into_mail());
    }
    for v in [1.0, 2.0, 3.0] {
        source.send(reading("setTemp", v, 0));
    }
    source.stop().await.unwrap();

    for display in displays {
        let display = display.stop().await.unwrap();
        assert_eq!(display.last, Some(3.0));
        assert_eq!(display.work, 3);
    }
}

#[tokio::test]
async fn test_direct_send_between_parts() {
    let runtime = runtime();
    let domain = Domain::default();
    let display = runtime.spawn(Display::default(), PartConfig::named("display"), &domain).unwrap();
    let relay = runtime
        .spawn(Relay { target: display.address() }, PartConfig::named("relay"), &domain)
        .unwrap();

    assert!(relay.send(reading("forward", 4.5, 0)));

    let relay_address = relay.address();
    relay.stop().await.unwrap();
    let display = display.stop().await.unwrap();

    assert_eq!(display.last, Some(4.5));
    assert_eq!(display.origin, Some(Origin::Direct));
    assert_eq!(display.from, Some(relay_address));
    assert_eq!(display.work, 1);
}

#[tokio::test]
async fn test_shutdown_closes_every_mailbox() {
    let runtime = runtime();
    let domain = Domain::default();
    let display = runtime.spawn(Display::default(), PartConfig::named("display"), &domain).unwrap();
    let thermometer = runtime.spawn(Thermometer, PartConfig::named("thermometer"), &domain).unwrap();
    assert!(runtime.is_open(display.address()));
    assert!(runtime.is_open(thermometer.address()));

    // Queued before shutdown, so still handled.
    assert!(display.send(reading("readTemp", 7.0, 0)));
    runtime.shutdown();

    assert!(!runtime.is_open(display.address()));
    assert!(!runtime.is_open(thermometer.address()));
    assert!(!display.send(reading("readTemp", 8.0, 0)));

    thermometer.stop().await.unwrap();
    let display = display.stop().await.unwrap();
    assert_eq!(display.last, Some(7.0));
    assert_eq!(display.work, 1);
}
