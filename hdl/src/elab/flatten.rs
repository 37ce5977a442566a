//! Flattening of instance arrays and interfaces into plain signals and instances.

use arcstr::ArcStr;

use crate::module::{Connectable, Instance, Module};
use crate::signal::{Signal, SignalId};

/// Returns `true` if `module` contains an instance array.
pub(crate) fn has_arrays(module: &Module) -> bool {
    module
        .instances
        .iter()
        .any(|inst| inst.array.is_some_and(|len| len > 0))
}

/// Replaces every instance array with its individual copies.
///
/// Copy `k` of array `x` is named `x_<k>`; copies of anonymous arrays stay anonymous.
/// A connection as wide as its port is connected to every copy.
/// A connection `n` times as wide as its port is split, with copy `k`
/// receiving bits `k*w..(k+1)*w`. Other connections are left for the validator.
/// Arrays of zero copies are also left for the validator to reject.
pub(crate) fn arrays(module: &mut Module) {
    let instances = std::mem::take(&mut module.instances);
    let mut flattened = Vec::with_capacity(instances.len());

    for inst in instances {
        let Some(len) = inst.array.filter(|len| *len > 0) else {
            flattened.push(inst);
            continue;
        };
        let ports = inst.of.ports().unwrap_or_default();
        for k in 0..len {
            let conns = inst
                .conns
                .iter()
                .map(|(name, conn)| {
                    let port = ports
                        .iter()
                        .find(|port| &port.name == name && !port.polymorphic);
                    let conn = match (port, conn.bits(module)) {
                        (Some(port), Some(bits))
                            if port.width > 0
                                && bits.len() != port.width
                                && bits.len() == port.width * len =>
                        {
                            let w = port.width;
                            Connectable::from_bits(&bits[k * w..(k + 1) * w], module)
                        }
                        _ => conn.clone(),
                    };
                    (name.clone(), conn)
                })
                .collect();
            flattened.push(Instance {
                name: inst.name.as_ref().map(|name| arcstr::format!("{name}_{k}")),
                of: inst.of.clone(),
                conns,
                array: None,
            });
        }
    }

    module.instances = flattened;
}

/// Returns `true` if `module` declares or connects an interface.
pub(crate) fn has_interfaces(module: &Module) -> bool {
    !module.interfaces.is_empty()
        || module.instances.iter().any(|inst| {
            inst.conns
                .iter()
                .any(|(_, conn)| matches!(conn, Connectable::Interface(_)))
        })
}

/// Replaces every interface instance `x` with one signal `x_<member>` per member,
/// and every connection `p -> x` with connections `p_<member> -> x_<member>`.
///
/// Members of port interfaces become ports, with directions swapped for flipped instances.
/// Connections to undeclared interfaces are left for the validator.
pub(crate) fn interfaces(module: &mut Module) {
    let owner = module.owner;
    let interfaces = std::mem::take(&mut module.interfaces);
    let members: Vec<Vec<(ArcStr, SignalId)>> = interfaces
        .iter()
        .map(|iface| {
            iface
                .of
                .signals()
                .iter()
                .map(|member| {
                    let name = arcstr::format!("{}_{}", iface.name, member.name);
                    let signal = if iface.port {
                        let dir = if iface.flipped {
                            member.direction.flip()
                        } else {
                            member.direction
                        };
                        Signal::port(name, member.width, dir)
                    } else {
                        Signal::new(name, member.width)
                    };
                    (member.name.clone(), module.add_signal(signal))
                })
                .collect()
        })
        .collect();

    for inst in module.instances.iter_mut() {
        let conns = std::mem::take(&mut inst.conns);
        for (port, conn) in conns {
            match conn {
                Connectable::Interface(id) if id.owner == owner && id.index < members.len() => {
                    for (member, signal) in members[id.index].iter() {
                        inst.conns.push((
                            arcstr::format!("{port}_{member}"),
                            Connectable::Signal(*signal),
                        ));
                    }
                }
                other => inst.conns.push((port, other)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_log::test;

    use super::*;
    use crate::interface::{Interface, InterfaceInstance};
    use crate::primitives::PrimitiveCall;
    use crate::signal::PortDir;

    #[test]
    fn arrays_split_wide_connections_and_broadcast_narrow_ones() {
        let mut m = Module::new("m");
        let bus = m.add_signal(Signal::new("bus", 3));
        let gnd = m.add_signal(Signal::new("gnd", 1));
        m.add_instance(
            Instance::new("r", PrimitiveCall::Short)
                .connect("p", bus)
                .connect("n", gnd)
                .array(3),
        );

        assert!(has_arrays(&m));
        arrays(&mut m);
        assert!(!has_arrays(&m));

        assert_eq!(m.instances().len(), 3);
        for (k, inst) in m.instances().iter().enumerate() {
            assert_eq!(inst.name().unwrap(), &format!("r_{k}"));
            assert_eq!(inst.connection("p"), Some(&Connectable::slice(bus, k..k + 1)));
            assert_eq!(inst.connection("n"), Some(&Connectable::Signal(gnd)));
        }
    }

    #[test]
    fn empty_arrays_are_kept() {
        let mut m = Module::new("m");
        let a = m.add_signal(Signal::new("a", 1));
        m.add_instance(
            Instance::new("r", PrimitiveCall::Short)
                .connect("p", a)
                .connect("n", a)
                .array(0),
        );

        assert!(!has_arrays(&m));
        arrays(&mut m);
        assert_eq!(m.instances().len(), 1);
        assert_eq!(m.instances()[0].array_len(), Some(0));
    }

    #[test]
    fn interfaces_become_prefixed_signals() {
        let bus = Arc::new(
            Interface::new("handshake")
                .signal("valid", 1, PortDir::Output)
                .signal("ready", 1, PortDir::Input),
        );
        let mut m = Module::new("m");
        m.add_port("clk", 1, PortDir::Input);
        let host = m.add_interface(InterfaceInstance::port("host", bus.clone()).flipped());
        let link = m.add_interface(InterfaceInstance::new("link", bus));
        let mut child = Module::new("child");
        child.add_port("io_valid", 1, PortDir::Output);
        child.add_port("io_ready", 1, PortDir::Input);
        let child = Arc::new(child);
        m.add_instance(Instance::new("a", child.clone()).connect("io", host));
        m.add_instance(Instance::new("b", child).connect("io", link));

        assert!(has_interfaces(&m));
        interfaces(&mut m);
        assert!(!has_interfaces(&m));

        let host_valid = m.signal_named("host_valid").unwrap();
        let host_ready = m.signal_named("host_ready").unwrap();
        let link_valid = m.signal_named("link_valid").unwrap();
        assert_eq!(m.signal(host_valid).unwrap().direction(), PortDir::Input);
        assert_eq!(m.signal(host_ready).unwrap().direction(), PortDir::Output);
        assert!(m.signal(host_valid).unwrap().is_port());
        assert!(!m.signal(link_valid).unwrap().is_port());

        let a = m.instance_named("a").unwrap();
        assert_eq!(a.connection("io_valid"), Some(&Connectable::Signal(host_valid)));
        assert_eq!(a.connection("io_ready"), Some(&Connectable::Signal(host_ready)));
        let b = m.instance_named("b").unwrap();
        assert_eq!(b.connection("io_valid"), Some(&Connectable::Signal(link_valid)));
    }
}
