//! Driver validation.
//!
//! Looks for issues such as multiply-driven nets and floating nets.

use std::fmt::{Display, Formatter};

use arcstr::ArcStr;
use diagnostics::{IssueSet, Severity};
use tracing::{span, Level};

use super::{Cause, ConnectivityError};
use crate::module::Module;
use crate::signal::{PortDir, Visibility};

/// A single bit of a signal.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Net {
    module: ArcStr,
    signal: ArcStr,
    idx: Option<usize>,
}

impl Net {
    /// The name of the module containing the net.
    #[inline]
    pub fn module(&self) -> &ArcStr {
        &self.module
    }

    /// The name of the signal.
    #[inline]
    pub fn signal(&self) -> &ArcStr {
        &self.signal
    }

    /// The bit index, for multi-bit signals.
    #[inline]
    pub fn idx(&self) -> Option<usize> {
        self.idx
    }
}

impl Display for Net {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.module, self.signal)?;
        if let Some(idx) = self.idx {
            write!(f, "[{idx}]")?;
        }
        Ok(())
    }
}

/// The state of a net.
#[derive(Debug, Clone, Default)]
struct NetState {
    /// The number of drivers on this net.
    ///
    /// A module input port counts as a driver.
    drivers: usize,
    /// The number of readers on this net.
    ///
    /// A module output port counts as a tap.
    taps: usize,
    /// The number of inouts connected to this net.
    ///
    /// Ports without a direction count as inouts.
    inouts: usize,
}

impl NetState {
    fn add(&mut self, dir: PortDir, count: usize) {
        match dir {
            PortDir::Output => self.drivers += count,
            PortDir::Input => self.taps += count,
            PortDir::Inout | PortDir::None => self.inouts += count,
        }
    }

    fn degree(&self) -> usize {
        self.drivers + self.taps + self.inouts
    }

    fn validate(&self, net: Net, output: &mut IssueSet<ConnectivityError>) {
        if self.drivers > 1 {
            output.add(ConnectivityError::new_and_log(
                Cause::MultipleDrivers {
                    net: net.clone(),
                    drivers: self.drivers,
                },
                Severity::Error,
            ));
        }

        if self.taps > 0 && self.inouts + self.drivers == 0 {
            output.add(ConnectivityError::new_and_log(
                Cause::NoDrivers { net: net.clone() },
                Severity::Warning,
            ));
        }

        if self.degree() == 0 {
            output.add(ConnectivityError::new_and_log(
                Cause::Floating { net },
                Severity::Warning,
            ));
        }
    }
}

/// Performs per-bit driver analysis of `module`.
///
/// Assumes the structural checks passed.
pub(crate) fn validate_drivers(module: &Module, issues: &mut IssueSet<ConnectivityError>) {
    let _guard = span!(Level::INFO, "validation pass 3 (driver analysis)").entered();

    let mut nets: Vec<Vec<NetState>> = module
        .signals
        .iter()
        .map(|signal| {
            let mut state = vec![NetState::default(); signal.width];
            if signal.visibility == Visibility::Port {
                // Seen from inside the module, an input port drives its net.
                for bit in state.iter_mut() {
                    bit.add(signal.direction.flip(), 1);
                }
            }
            state
        })
        .collect();

    for inst in module.instances() {
        let Some(ports) = inst.of.ports() else {
            continue;
        };
        let len = inst.array.unwrap_or(1);
        for port in ports.iter().filter(|port| port.interface.is_none()) {
            let Some(bits) = inst
                .connection(&port.name)
                .and_then(|conn| conn.bits(module))
            else {
                continue;
            };
            let copies = if bits.len() == port.width { len } else { 1 };
            for (signal, idx) in bits {
                if let Some(state) = nets
                    .get_mut(signal.index())
                    .and_then(|net| net.get_mut(idx))
                {
                    state.add(port.direction, copies);
                }
            }
        }
    }

    for (signal, states) in module.signals.iter().zip(nets.iter()) {
        let name = signal
            .name
            .clone()
            .unwrap_or_else(|| arcstr::literal!("<anonymous>"));
        for (idx, state) in states.iter().enumerate() {
            let net = Net {
                module: module.name.clone(),
                signal: name.clone(),
                idx: (signal.width > 1).then_some(idx),
            };
            state.validate(net, issues);
        }
    }
}
