use std::sync::{Arc, Mutex};

use arcstr::ArcStr;
use diagnostics::{Diagnostic, Severity};
use rust_decimal_macros::dec;
use test_log::test;
use tracing::Level;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use super::{validate, Cause, ConnectivityError};
use crate::interface::{Interface, InterfaceInstId, InterfaceInstance};
use crate::module::{Connectable, ExternalModule, ExternalModuleCall, Instance, Module};
use crate::params::ParamValue;
use crate::primitives::PrimitiveCall;
use crate::signal::{PortDir, Signal, SignalId};

fn buf() -> ExternalModuleCall {
    Arc::new(
        ExternalModule::new("buf")
            .port("a", 2, PortDir::Input)
            .port("y", 1, PortDir::Output),
    )
    .call(std::iter::empty::<(ArcStr, ParamValue)>())
}

fn causes(issues: &diagnostics::IssueSet<ConnectivityError>) -> Vec<Cause> {
    issues.iter().map(|issue| issue.cause().clone()).collect()
}

#[test]
fn duplicate_names_and_zero_width_signals() {
    let mut m = Module::new("top");
    let x = m.add_signal(Signal::new("x", 1));
    m.add_signal(Signal::new("x", 1));
    m.add_signal(Signal::new("z", 0));
    for _ in 0..2 {
        m.add_instance(
            Instance::new("r", PrimitiveCall::IdealResistor(dec!(1)))
                .connect("p", x)
                .connect("n", x),
        );
    }

    let issues = validate(&m);
    assert_eq!(issues.num_errors(), 3);
    let causes = causes(&issues);
    let top = arcstr::literal!("top");
    assert!(causes.contains(&Cause::DuplicateSignalName {
        module: top.clone(),
        name: arcstr::literal!("x"),
    }));
    assert!(causes.contains(&Cause::ZeroWidthSignal {
        module: top.clone(),
        signal: arcstr::literal!("z"),
    }));
    assert!(causes.contains(&Cause::DuplicateInstanceName {
        module: top,
        name: arcstr::literal!("r"),
    }));
}

#[test]
fn bad_connections_are_reported() {
    let mut m = Module::new("top");
    let a = m.add_signal(Signal::new("a", 2));
    let y = m.add_signal(Signal::new("y", 1));
    m.add_instance(
        Instance::new("extra", buf())
            .connect("a", a)
            .connect("y", y)
            .connect("q", y),
    );
    m.add_instance(
        Instance::new("twice", buf())
            .connect("a", a)
            .connect("y", y)
            .connect("y", y),
    );
    let missing = SignalId {
        owner: m.owner,
        index: 9,
    };
    m.add_instance(
        Instance::new("missing", buf())
            .connect("a", missing)
            .connect("y", y),
    );
    m.add_instance(
        Instance::new("slice", buf())
            .connect("a", Connectable::slice(a, 1..3))
            .connect("y", y),
    );

    let issues = validate(&m);
    let top = arcstr::literal!("top");
    assert_eq!(
        causes(&issues),
        vec![
            Cause::ExtraPort {
                module: top.clone(),
                instance: arcstr::literal!("extra"),
                target: arcstr::literal!("buf"),
                port: arcstr::literal!("q"),
            },
            Cause::DuplicateConnection {
                module: top.clone(),
                instance: arcstr::literal!("twice"),
                port: arcstr::literal!("y"),
            },
            Cause::MissingSignal {
                module: top.clone(),
                instance: arcstr::literal!("missing"),
                port: arcstr::literal!("a"),
                signal: missing,
            },
            Cause::SliceOutOfBounds {
                module: top,
                instance: arcstr::literal!("slice"),
                port: arcstr::literal!("a"),
                signal: arcstr::literal!("a"),
                start: 1,
                end: 3,
                width: 2,
            },
        ]
    );
    assert!(issues.iter().all(|issue| issue.severity() == Severity::Error));
}

#[test]
fn array_connections_broadcast_or_split() {
    let mut m = Module::new("top");
    let din = m.add_port("din", 2, PortDir::Input);
    let outs = m.add_signal(Signal::new("outs", 3));
    m.add_instance(
        Instance::new("bufs", buf())
            .array(3)
            .connect("a", din)
            .connect("y", outs),
    );
    assert!(validate(&m).is_empty());

    let narrow = m.add_signal(Signal::new("narrow", 2));
    m.add_instance(
        Instance::new("bad", buf())
            .array(3)
            .connect("a", din)
            .connect("y", narrow),
    );
    assert_eq!(
        causes(&validate(&m)),
        vec![Cause::ArrayWidthMismatch {
            module: arcstr::literal!("top"),
            instance: arcstr::literal!("bad"),
            port: arcstr::literal!("y"),
            port_width: 1,
            len: 3,
            actual: 2,
        }]
    );
}

#[test]
fn interface_connections_must_match() {
    let diff = Arc::new(
        Interface::new("diff")
            .signal("p", 1, PortDir::Inout)
            .signal("n", 1, PortDir::Inout),
    );
    let clk = Arc::new(Interface::new("clk").signal("c", 2, PortDir::Input));
    let mut rx = Module::new("rx");
    rx.add_interface(InterfaceInstance::port("io", diff.clone()));
    let rx = Arc::new(rx);

    let mut m = Module::new("top");
    let wire = m.add_signal(Signal::new("wire", 2));
    let link = m.add_interface(InterfaceInstance::new("link", diff));
    let clock = m.add_interface(InterfaceInstance::new("clock", clk));
    m.add_instance(Instance::new("ok", rx.clone()).connect("io", link));
    m.add_instance(Instance::new("wrong", rx.clone()).connect("io", clock));
    m.add_instance(Instance::new("plain", rx.clone()).connect("io", wire));
    m.add_instance(
        Instance::new("undeclared", rx).connect(
            "io",
            InterfaceInstId {
                owner: m.owner,
                index: 5,
            },
        ),
    );
    m.add_instance(
        Instance::new("b", buf())
            .connect("a", Connectable::concat([Connectable::from(link)]))
            .connect("y", clock),
    );

    let top = arcstr::literal!("top");
    let port = |name: &'static str| ArcStr::from(name);
    assert_eq!(
        causes(&validate(&m)),
        vec![
            Cause::InterfaceMismatch {
                module: top.clone(),
                instance: arcstr::literal!("wrong"),
                port: port("io"),
                expected: Some(arcstr::literal!("diff")),
                found: Some(arcstr::literal!("clk")),
            },
            Cause::InterfaceMismatch {
                module: top.clone(),
                instance: arcstr::literal!("plain"),
                port: port("io"),
                expected: Some(arcstr::literal!("diff")),
                found: None,
            },
            Cause::MissingInterface {
                module: top.clone(),
                instance: arcstr::literal!("undeclared"),
                port: port("io"),
            },
            Cause::NestedInterface {
                module: top.clone(),
                instance: arcstr::literal!("b"),
                port: port("a"),
            },
            Cause::InterfaceMismatch {
                module: top,
                instance: arcstr::literal!("b"),
                port: port("y"),
                expected: None,
                found: Some(arcstr::literal!("clk")),
            },
        ]
    );
}

#[test]
fn undriven_nets_are_warnings() {
    let mut m = Module::new("top");
    let out = m.add_port("out", 1, PortDir::Output);
    let w = m.add_signal(Signal::new("w", 2));
    m.add_instance(Instance::new("b", buf()).connect("a", w).connect("y", out));

    let issues = validate(&m);
    assert!(!issues.has_error());
    assert_eq!(issues.num_warnings(), 2);
    for (idx, cause) in causes(&issues).into_iter().enumerate() {
        match cause {
            Cause::NoDrivers { net } => {
                assert_eq!(net.signal(), "w");
                assert_eq!(net.idx(), Some(idx));
            }
            other => panic!("unexpected issue: {other:?}"),
        }
    }
}

#[test]
fn signals_of_other_modules_are_missing() {
    let mut other = Module::new("other");
    other.add_signal(Signal::new("x", 2));
    let foreign = other.add_signal(Signal::new("y", 1));

    let mut m = Module::new("top");
    let a = m.add_signal(Signal::new("a", 2));
    m.add_signal(Signal::new("b", 1));
    m.add_instance(Instance::new("u", buf()).connect("a", a).connect("y", foreign));

    assert_eq!(
        causes(&validate(&m)),
        vec![Cause::MissingSignal {
            module: arcstr::literal!("top"),
            instance: arcstr::literal!("u"),
            port: arcstr::literal!("y"),
            signal: foreign,
        }]
    );
}

#[test]
fn empty_arrays_are_rejected() {
    let mut m = Module::new("top");
    let a = m.add_signal(Signal::new("a", 2));
    let y = m.add_signal(Signal::new("y", 1));
    m.add_instance(
        Instance::new("none", buf())
            .array(0)
            .connect("a", a)
            .connect("y", y),
    );

    assert_eq!(
        causes(&validate(&m)),
        vec![Cause::EmptyArray {
            module: arcstr::literal!("top"),
            instance: arcstr::literal!("none"),
        }]
    );
}

#[test]
fn implicit_connections_outside_elaboration() {
    let mut m = Module::new("top");
    let a = m.add_signal(Signal::new("a", 2));
    let y = m.add_signal(Signal::new("y", 1));
    m.add_instance(Instance::new("open", buf()).connect("a", a).connect("y", Connectable::noconn()));
    m.add_instance(
        Instance::new("linked", buf())
            .connect("a", a)
            .connect("y", Connectable::port_of("open", "y")),
    );
    m.add_instance(
        Instance::new("nested", buf())
            .connect("a", Connectable::concat([Connectable::from(y), Connectable::noconn()]))
            .connect("y", y),
    );

    let top = arcstr::literal!("top");
    let port = arcstr::literal!("y");
    assert_eq!(
        causes(&validate(&m)),
        vec![
            Cause::UnresolvedPortRef {
                module: top.clone(),
                instance: arcstr::literal!("linked"),
                port: port.clone(),
                target_instance: arcstr::literal!("open"),
                target_port: port,
            },
            Cause::NestedImplicit {
                module: top,
                instance: arcstr::literal!("nested"),
                port: arcstr::literal!("a"),
            },
        ]
    );
}

/// Records the level of every event.
#[derive(Clone, Default)]
struct Levels(Arc<Mutex<Vec<Level>>>);

impl<S: tracing::Subscriber> Layer<S> for Levels {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(*event.metadata().level());
    }
}

#[test]
fn issues_are_logged_at_their_severity() {
    let levels = Levels::default();
    let subscriber = tracing_subscriber::registry().with(levels.clone());
    tracing::subscriber::with_default(subscriber, || {
        for severity in [Severity::Info, Severity::Warning, Severity::Error] {
            let issue = ConnectivityError::new_and_log(
                Cause::ZeroWidthSignal {
                    module: arcstr::literal!("top"),
                    signal: arcstr::literal!("z"),
                },
                severity,
            );
            assert_eq!(issue.severity(), severity);
        }
    });
    assert_eq!(
        *levels.0.lock().unwrap(),
        vec![Level::INFO, Level::WARN, Level::ERROR]
    );
}
