//! Signals implied by no-connects and port-to-port connections.

use std::collections::HashMap;

use arcstr::ArcStr;
use diagnostics::{IssueSet, Severity};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::{event, Level};
use uniquify::Names;

use crate::module::{Connectable, Instance, Module};
use crate::signal::Signal;
use crate::validation::{Cause, ConnectivityError};

/// A port of an instance: the instance's position and the port name.
type PortKey = (usize, ArcStr);

/// Returns `true` if `module` has a no-connect or a port reference.
pub(crate) fn has_implicit(module: &Module) -> bool {
    module
        .instances
        .iter()
        .any(|inst| inst.conns.iter().any(|(_, conn)| conn.is_implicit()))
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
struct NetKey(u32);

type NetUf = ena::unify::InPlaceUnificationTable<NetKey>;

/// The value associated to a port in the union find data structure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct NetValue {
    /// The position of the earliest registered port in a set of joined ports.
    first: usize,
}

impl ena::unify::UnifyKey for NetKey {
    type Value = NetValue;
    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "NetKey"
    }
}

impl ena::unify::UnifyValue for NetValue {
    type Error = ena::unify::NoError;

    fn unify_values(value1: &Self, value2: &Self) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            first: value1.first.min(value2.first),
        })
    }
}

/// Ports joined by port references.
struct Nets {
    ports: IndexMap<PortKey, NetKey>,
    uf: NetUf,
}

impl Nets {
    fn new() -> Self {
        Self {
            ports: IndexMap::new(),
            uf: NetUf::new(),
        }
    }

    fn register(&mut self, port: PortKey) -> NetKey {
        if let Some(key) = self.ports.get(&port) {
            return *key;
        }
        let key = self.uf.new_key(NetValue {
            first: self.ports.len(),
        });
        self.ports.insert(port, key);
        key
    }

    fn join(&mut self, a: PortKey, b: PortKey) {
        let a = self.register(a);
        let b = self.register(b);
        self.uf.union(a, b);
    }

    fn contains(&self, port: &PortKey) -> bool {
        self.ports.contains_key(port)
    }

    /// The joined groups, each in order of first appearance.
    fn groups(mut self) -> Vec<Vec<PortKey>> {
        let mut groups: IndexMap<usize, Vec<PortKey>> = IndexMap::new();
        for (port, key) in self.ports.iter() {
            let first = self.uf.probe_value(*key).first;
            groups.entry(first).or_default().push(port.clone());
        }
        groups.into_values().collect()
    }
}

/// The width of the signal needed to connect `port` of `inst`,
/// or `None` if the port does not exist.
fn port_width(inst: &Instance, port: &str) -> Option<usize> {
    let width = inst
        .of
        .ports()?
        .into_iter()
        .find(|info| info.name == port)?
        .width;
    Some(width * inst.array.unwrap_or(1)).filter(|width| *width > 0)
}

fn set_connection(inst: &mut Instance, port: &ArcStr, conn: Connectable) {
    match inst.conns.iter_mut().find(|(name, _)| name == port) {
        Some((_, existing)) => *existing = conn,
        None => inst.conns.push((port.clone(), conn)),
    }
}

/// Replaces no-connects and port references with plain signal connections.
///
/// Runs after anonymous instances are named. Anything that cannot be resolved
/// is left in place and reported.
pub(crate) fn resolve(module: &mut Module) -> IssueSet<ConnectivityError> {
    let mut issues = IssueSet::new();
    let mut names = Names::new();
    for name in module.signals.iter().filter_map(|s| s.name.clone()) {
        names.reserve(name);
    }
    let positions: HashMap<ArcStr, usize> = module
        .instances
        .iter()
        .enumerate()
        .filter_map(|(idx, inst)| Some((inst.name.clone()?, idx)))
        .collect();

    let mut nets = Nets::new();
    let mut noconns = Vec::new();
    for (idx, inst) in module.instances.iter().enumerate() {
        for (port, conn) in inst.conns.iter() {
            match conn {
                Connectable::NoConn(name) => noconns.push(((idx, port.clone()), name.clone())),
                Connectable::Port {
                    instance: target_instance,
                    port: target_port,
                } => {
                    let target = positions.get(target_instance).copied().filter(|target| {
                        port_width(&module.instances[*target], target_port).is_some()
                    });
                    match target {
                        Some(target) => {
                            nets.join((idx, port.clone()), (target, target_port.clone()))
                        }
                        None => issues.add(ConnectivityError::new_and_log(
                            Cause::UnresolvedPortRef {
                                module: module.name.clone(),
                                instance: inst.display_name(),
                                port: port.clone(),
                                target_instance: target_instance.clone(),
                                target_port: target_port.clone(),
                            },
                            Severity::Error,
                        )),
                    }
                }
                _ => (),
            }
        }
    }

    for (key, name) in noconns {
        let (idx, port) = &key;
        if nets.contains(&key) {
            issues.add(ConnectivityError::new_and_log(
                Cause::ReferencedNoConn {
                    module: module.name.clone(),
                    instance: module.instances[*idx].display_name(),
                    port: port.clone(),
                },
                Severity::Error,
            ));
            continue;
        }
        // Unknown ports are reported by the validator.
        let Some(width) = port_width(&module.instances[*idx], port) else {
            continue;
        };
        let name = match name {
            Some(name) => {
                names.reserve(name.clone());
                name
            }
            None => {
                let base = format!("{}_{port}", module.instances[*idx].display_name());
                names.assign_name(key.clone(), &base)
            }
        };
        event!(Level::TRACE, module = %module.name, %name, "created signal for no-connect");
        let signal = module.add_signal(Signal::new(name, width));
        set_connection(&mut module.instances[*idx], port, Connectable::Signal(signal));
    }

    for group in nets.groups() {
        let conns: Vec<Option<&Connectable>> = group
            .iter()
            .map(|(idx, port)| module.instances[*idx].connection(port))
            .collect();
        if conns.iter().flatten().any(|conn| matches!(conn, Connectable::NoConn(_))) {
            continue;
        }
        // Each port holds at most one reference, so at most one port on a net
        // has a concrete connection.
        let existing = conns
            .into_iter()
            .flatten()
            .find(|conn| !conn.is_implicit())
            .cloned();

        let conn = match existing {
            Some(conn) => conn,
            None => {
                let Some(width) = group
                    .iter()
                    .find_map(|(idx, port)| port_width(&module.instances[*idx], port))
                else {
                    continue;
                };
                let base = group
                    .iter()
                    .map(|(idx, port)| format!("{}_{port}", module.instances[*idx].display_name()))
                    .join("_");
                let name = names.assign_name(group[0].clone(), &base);
                event!(Level::TRACE, module = %module.name, %name, "created signal for port references");
                Connectable::Signal(module.add_signal(Signal::new(name, width)))
            }
        };

        for (idx, port) in group.iter() {
            let inst = &mut module.instances[*idx];
            if inst.connection(port).map_or(true, Connectable::is_implicit) {
                set_connection(inst, port, conn.clone());
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use test_log::test;

    use super::*;
    use crate::primitives::PrimitiveCall;
    use crate::signal::PortDir;

    fn resistor(name: &str) -> Instance {
        Instance::new(name, PrimitiveCall::IdealResistor(dec!(1)))
    }

    #[test]
    fn noconns_become_signals_named_after_their_port() {
        let mut m = Module::new("m");
        let a = m.add_port("a", 1, PortDir::Inout);
        m.add_signal(Signal::new("r0_n", 1));
        m.add_instance(resistor("r0").connect("p", a).connect("n", Connectable::noconn()));
        m.add_instance(
            resistor("r1")
                .connect("p", a)
                .connect("n", Connectable::noconn_named("sense")),
        );

        assert!(has_implicit(&m));
        let issues = resolve(&mut m);
        assert!(issues.is_empty());
        assert!(!has_implicit(&m));

        let r0_n = m.signal_named("r0_n_1").unwrap();
        assert_eq!(
            m.instance_named("r0").unwrap().connection("n"),
            Some(&Connectable::Signal(r0_n))
        );
        let named = m.signal_named("sense").unwrap();
        assert_eq!(
            m.instance_named("r1").unwrap().connection("n"),
            Some(&Connectable::Signal(named))
        );
    }

    #[test]
    fn port_references_share_a_signal() {
        let mut m = Module::new("m");
        let a = m.add_port("a", 1, PortDir::Inout);
        m.add_instance(resistor("r0").connect("p", a).connect("n", Connectable::port_of("r1", "p")));
        m.add_instance(resistor("r1").connect("n", a));
        m.add_instance(resistor("r2").connect("p", Connectable::port_of("r1", "p")).connect("n", a));

        let issues = resolve(&mut m);
        assert!(issues.is_empty());
        let net = m.signal_named("r0_n_r1_p_r2_p").unwrap();
        assert_eq!(m.signal(net).unwrap().width(), 1);
        let conn = Connectable::Signal(net);
        assert_eq!(m.instance_named("r0").unwrap().connection("n"), Some(&conn));
        assert_eq!(m.instance_named("r1").unwrap().connection("p"), Some(&conn));
        assert_eq!(m.instance_named("r2").unwrap().connection("p"), Some(&conn));
    }

    #[test]
    fn port_references_reuse_an_existing_connection() {
        let mut m = Module::new("m");
        let a = m.add_port("a", 1, PortDir::Inout);
        let b = m.add_port("b", 1, PortDir::Inout);
        m.add_instance(resistor("r0").connect("p", a).connect("n", b));
        m.add_instance(resistor("r1").connect("p", Connectable::port_of("r0", "n")).connect("n", a));

        assert!(resolve(&mut m).is_empty());
        assert_eq!(m.signals().count(), 2);
        assert_eq!(
            m.instance_named("r1").unwrap().connection("p"),
            Some(&Connectable::Signal(b))
        );
    }

    #[test]
    fn unresolvable_references_are_reported() {
        let mut m = Module::new("m");
        let a = m.add_port("a", 1, PortDir::Inout);
        m.add_instance(resistor("r0").connect("p", a).connect("n", Connectable::port_of("rx", "p")));
        m.add_instance(resistor("r1").connect("p", a).connect("n", Connectable::port_of("r0", "q")));
        m.add_instance(resistor("r2").connect("p", a).connect("n", Connectable::noconn()));
        m.add_instance(resistor("r3").connect("p", a).connect("n", Connectable::port_of("r2", "n")));

        let causes: Vec<_> = resolve(&mut m)
            .into_iter()
            .map(|issue| issue.cause().clone())
            .collect();
        let module = arcstr::literal!("m");
        let n = arcstr::literal!("n");
        assert_eq!(
            causes,
            vec![
                Cause::UnresolvedPortRef {
                    module: module.clone(),
                    instance: arcstr::literal!("r0"),
                    port: n.clone(),
                    target_instance: arcstr::literal!("rx"),
                    target_port: arcstr::literal!("p"),
                },
                Cause::UnresolvedPortRef {
                    module: module.clone(),
                    instance: arcstr::literal!("r1"),
                    port: n.clone(),
                    target_instance: arcstr::literal!("r0"),
                    target_port: arcstr::literal!("q"),
                },
                Cause::ReferencedNoConn {
                    module,
                    instance: arcstr::literal!("r2"),
                    port: n,
                },
            ]
        );
        for name in ["r0", "r1", "r2", "r3"] {
            assert!(m
                .instance_named(name)
                .unwrap()
                .connection("n")
                .is_some_and(Connectable::is_implicit));
        }
    }
}
