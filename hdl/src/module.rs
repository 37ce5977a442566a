//! Modules, instances, and connections.

use std::ops::Range;
use std::sync::Arc;

use arcstr::ArcStr;

use crate::generator::GeneratorCall;
use crate::interface::{Interface, InterfaceInstId, InterfaceInstance};
use crate::params::ParamValue;
use crate::primitives::PrimitiveCall;
use crate::signal::{Owner, PortDir, Signal, SignalId};

/// What an instance port is connected to, in terms of the enclosing module.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Connectable {
    /// An entire signal.
    Signal(SignalId),
    /// Bits `start..end` of a signal. Bit 0 is the least significant bit.
    Slice {
        /// The sliced signal.
        signal: SignalId,
        /// The first bit, inclusive.
        start: usize,
        /// The last bit, exclusive.
        end: usize,
    },
    /// A concatenation, least significant part first.
    Concat(Vec<Connectable>),
    /// An interface instance, connected to an interface port.
    Interface(InterfaceInstId),
    /// A port left unconnected on purpose.
    ///
    /// Elaboration replaces it with a fresh signal as wide as the port, named
    /// after the no-connect if it has a name and `<instance>_<port>` otherwise.
    NoConn(Option<ArcStr>),
    /// Whatever port `port` of the instance named `instance` is connected to.
    ///
    /// Elaboration joins all ports that reference each other into one net.
    /// The net is the signal one of them is connected to. If none of them is
    /// connected, a new signal named after every port on the net is created.
    Port {
        /// The referenced instance.
        instance: ArcStr,
        /// The referenced port of that instance.
        port: ArcStr,
    },
}

/// A reason a [`Connectable`] cannot be resolved within a module.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub(crate) enum ConnError {
    MissingSignal(SignalId),
    SliceOutOfBounds {
        signal: SignalId,
        start: usize,
        end: usize,
        width: usize,
    },
    NestedInterface,
    Implicit,
}

impl Connectable {
    /// Bits `range` of `signal`.
    pub fn slice(signal: SignalId, range: Range<usize>) -> Self {
        Self::Slice {
            signal,
            start: range.start,
            end: range.end,
        }
    }

    /// An explicit no-connect.
    #[inline]
    pub fn noconn() -> Self {
        Self::NoConn(None)
    }

    /// An explicit no-connect, whose signal is named `name`.
    #[inline]
    pub fn noconn_named(name: impl Into<ArcStr>) -> Self {
        Self::NoConn(Some(name.into()))
    }

    /// A reference to port `port` of the instance named `instance`.
    pub fn port_of(instance: impl Into<ArcStr>, port: impl Into<ArcStr>) -> Self {
        Self::Port {
            instance: instance.into(),
            port: port.into(),
        }
    }

    /// Returns `true` for connections that elaboration turns into new signals.
    #[inline]
    pub(crate) fn is_implicit(&self) -> bool {
        matches!(self, Self::NoConn(_) | Self::Port { .. })
    }

    /// Concatenates `parts`, least significant part first.
    pub fn concat(parts: impl IntoIterator<Item = impl Into<Connectable>>) -> Self {
        Self::Concat(parts.into_iter().map(Into::into).collect())
    }

    /// The width of this connection within `module`,
    /// or `None` if it cannot be resolved or is an interface.
    pub fn width(&self, module: &Module) -> Option<usize> {
        self.resolve_width(module).ok()
    }

    pub(crate) fn resolve_width(&self, module: &Module) -> Result<usize, ConnError> {
        match self {
            Self::Signal(id) => module
                .signal(*id)
                .map(|s| s.width)
                .ok_or(ConnError::MissingSignal(*id)),
            Self::Slice { signal, start, end } => {
                let width = module
                    .signal(*signal)
                    .ok_or(ConnError::MissingSignal(*signal))?
                    .width;
                if start >= end || *end > width {
                    return Err(ConnError::SliceOutOfBounds {
                        signal: *signal,
                        start: *start,
                        end: *end,
                        width,
                    });
                }
                Ok(end - start)
            }
            Self::Concat(parts) => parts.iter().map(|p| p.resolve_width(module)).sum(),
            Self::Interface(_) => Err(ConnError::NestedInterface),
            Self::NoConn(_) | Self::Port { .. } => Err(ConnError::Implicit),
        }
    }

    /// The individual bits of this connection, least significant first.
    ///
    /// Returns `None` if the connection cannot be resolved within `module`.
    pub fn bits(&self, module: &Module) -> Option<Vec<(SignalId, usize)>> {
        self.resolve_width(module).ok()?;
        let mut bits = Vec::new();
        self.push_bits(module, &mut bits);
        Some(bits)
    }

    fn push_bits(&self, module: &Module, bits: &mut Vec<(SignalId, usize)>) {
        match self {
            Self::Signal(id) => {
                let width = module.signal(*id).map_or(0, |s| s.width);
                bits.extend((0..width).map(|i| (*id, i)));
            }
            Self::Slice { signal, start, end } => {
                bits.extend((*start..*end).map(|i| (*signal, i)));
            }
            Self::Concat(parts) => {
                for part in parts {
                    part.push_bits(module, bits);
                }
            }
            Self::Interface(_) | Self::NoConn(_) | Self::Port { .. } => (),
        }
    }

    /// Rebuilds a connection from a list of bits, least significant first.
    ///
    /// Consecutive bits of the same signal are merged into slices,
    /// and a slice covering an entire signal becomes [`Connectable::Signal`].
    pub(crate) fn from_bits(bits: &[(SignalId, usize)], module: &Module) -> Self {
        let mut parts: Vec<Connectable> = Vec::new();
        let mut i = 0;
        while i < bits.len() {
            let (signal, start) = bits[i];
            let mut end = start + 1;
            while i + (end - start) < bits.len() && bits[i + (end - start)] == (signal, end) {
                end += 1;
            }
            i += end - start;
            let full = module.signal(signal).map(|s| s.width) == Some(end - start) && start == 0;
            parts.push(if full {
                Self::Signal(signal)
            } else {
                Self::Slice { signal, start, end }
            });
        }
        if parts.len() == 1 {
            parts.remove(0)
        } else {
            Self::Concat(parts)
        }
    }
}

impl From<SignalId> for Connectable {
    fn from(value: SignalId) -> Self {
        Self::Signal(value)
    }
}

impl From<InterfaceInstId> for Connectable {
    fn from(value: InterfaceInstId) -> Self {
        Self::Interface(value)
    }
}

/// A module defined outside of this library, such as a foundry cell.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ExternalModule {
    name: ArcStr,
    domain: Option<ArcStr>,
    ports: Vec<Signal>,
}

impl ExternalModule {
    /// Creates an external module with no ports.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            domain: None,
            ports: Vec::new(),
        }
    }

    /// Sets the domain (for example, the PDK name) of this module.
    pub fn domain(mut self, domain: impl Into<ArcStr>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Appends a port.
    pub fn port(mut self, name: impl Into<ArcStr>, width: usize, direction: PortDir) -> Self {
        self.ports.push(Signal::port(name, width, direction));
        self
    }

    /// Appends a port that accepts connections of any width.
    pub fn polymorphic_port(mut self, name: impl Into<ArcStr>, direction: PortDir) -> Self {
        self.ports.push(Signal::port(name, 1, direction).polymorphic());
        self
    }

    /// The name of this module.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The domain of this module, if any.
    #[inline]
    pub fn domain_name(&self) -> Option<&ArcStr> {
        self.domain.as_ref()
    }

    /// The ordered port list.
    #[inline]
    pub fn ports(&self) -> &[Signal] {
        &self.ports
    }

    /// Binds this module to a list of parameter values.
    pub fn call(
        self: &Arc<Self>,
        params: impl IntoIterator<Item = (impl Into<ArcStr>, impl Into<ParamValue>)>,
    ) -> ExternalModuleCall {
        ExternalModuleCall {
            module: self.clone(),
            params: params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// An [`ExternalModule`] bound to parameter values.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ExternalModuleCall {
    module: Arc<ExternalModule>,
    params: Vec<(ArcStr, ParamValue)>,
}

impl ExternalModuleCall {
    /// The called module.
    #[inline]
    pub fn module(&self) -> &Arc<ExternalModule> {
        &self.module
    }

    /// The parameter values, in the order they are rendered.
    #[inline]
    pub fn params(&self) -> &[(ArcStr, ParamValue)] {
        &self.params
    }
}

/// Anything that can be the target of an [`Instance`].
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Instantiable {
    /// A module.
    Module(Arc<Module>),
    /// A primitive device.
    Primitive(PrimitiveCall),
    /// An external module.
    External(ExternalModuleCall),
    /// A generator call, resolved to a module during elaboration.
    Generator(GeneratorCall),
}

/// Information about a port of an instantiation target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PortInfo {
    /// The port name.
    pub name: ArcStr,
    /// The port width in bits.
    pub width: usize,
    /// The port direction.
    pub direction: PortDir,
    /// Whether the port accepts connections of any width.
    pub polymorphic: bool,
    /// The interface of an interface port.
    pub interface: Option<Arc<Interface>>,
}

impl PortInfo {
    fn from_signal(signal: &Signal) -> Self {
        Self {
            name: signal.name.clone().unwrap_or_default(),
            width: signal.width,
            direction: signal.direction,
            polymorphic: signal.polymorphic,
            interface: None,
        }
    }
}

impl Instantiable {
    /// A name for the target, used in diagnostics.
    pub fn name(&self) -> ArcStr {
        match self {
            Self::Module(module) => module.name.clone(),
            Self::Primitive(call) => ArcStr::from(call.kind().name()),
            Self::External(call) => call.module.name.clone(),
            Self::Generator(call) => call.generator_name().clone(),
        }
    }

    /// The ordered ports of the target, or `None` for an unresolved generator call.
    pub fn ports(&self) -> Option<Vec<PortInfo>> {
        match self {
            Self::Module(module) => Some(module.port_info()),
            Self::Primitive(call) => Some(
                call.ports()
                    .iter()
                    .map(|name| PortInfo {
                        name: ArcStr::from(*name),
                        width: 1,
                        direction: PortDir::Inout,
                        polymorphic: false,
                        interface: None,
                    })
                    .collect(),
            ),
            Self::External(call) => {
                Some(call.module.ports.iter().map(PortInfo::from_signal).collect())
            }
            Self::Generator(_) => None,
        }
    }
}

impl From<Arc<Module>> for Instantiable {
    fn from(value: Arc<Module>) -> Self {
        Self::Module(value)
    }
}

impl From<Module> for Instantiable {
    fn from(value: Module) -> Self {
        Self::Module(Arc::new(value))
    }
}

impl From<PrimitiveCall> for Instantiable {
    fn from(value: PrimitiveCall) -> Self {
        Self::Primitive(value)
    }
}

impl From<ExternalModuleCall> for Instantiable {
    fn from(value: ExternalModuleCall) -> Self {
        Self::External(value)
    }
}

impl From<GeneratorCall> for Instantiable {
    fn from(value: GeneratorCall) -> Self {
        Self::Generator(value)
    }
}

/// A placement of an [`Instantiable`] within a module.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Instance {
    pub(crate) name: Option<ArcStr>,
    pub(crate) of: Instantiable,
    pub(crate) conns: Vec<(ArcStr, Connectable)>,
    pub(crate) array: Option<usize>,
}

impl Instance {
    /// Creates a new named instance with no connections.
    pub fn new(name: impl Into<ArcStr>, of: impl Into<Instantiable>) -> Self {
        Self {
            name: Some(name.into()),
            of: of.into(),
            conns: Vec::new(),
            array: None,
        }
    }

    /// Creates a new instance whose name is assigned during elaboration.
    pub fn anonymous(of: impl Into<Instantiable>) -> Self {
        Self {
            name: None,
            of: of.into(),
            conns: Vec::new(),
            array: None,
        }
    }

    /// Connects port `port` of the target to `conn`.
    pub fn connect(mut self, port: impl Into<ArcStr>, conn: impl Into<Connectable>) -> Self {
        self.conns.push((port.into(), conn.into()));
        self
    }

    /// Turns this instance into an array of `n` copies.
    ///
    /// Elaboration replaces the array with instances named `<name>_<k>`.
    /// An array of zero copies fails validation.
    pub fn array(mut self, n: usize) -> Self {
        self.array = Some(n);
        self
    }

    /// The name of the instance, if one has been assigned.
    #[inline]
    pub fn name(&self) -> Option<&ArcStr> {
        self.name.as_ref()
    }

    /// The instantiation target.
    #[inline]
    pub fn of(&self) -> &Instantiable {
        &self.of
    }

    /// The connections, in the order they were made.
    #[inline]
    pub fn connections(&self) -> &[(ArcStr, Connectable)] {
        &self.conns
    }

    /// The connection to the given port, if any.
    pub fn connection(&self, port: &str) -> Option<&Connectable> {
        self.conns
            .iter()
            .find(|(name, _)| name == port)
            .map(|(_, conn)| conn)
    }

    /// The number of copies, for an instance array.
    #[inline]
    pub fn array_len(&self) -> Option<usize> {
        self.array
    }

    pub(crate) fn display_name(&self) -> ArcStr {
        self.name
            .clone()
            .unwrap_or_else(|| arcstr::literal!("<anonymous>"))
    }
}

/// A named circuit template.
///
/// Once wrapped in an [`Arc`] and instantiated, a module is immutable
/// and may be shared by any number of instances.
///
/// The IDs a module hands out only resolve within that module and its clones.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Module {
    pub(crate) name: ArcStr,
    pub(crate) owner: Owner,
    pub(crate) signals: Vec<Signal>,
    pub(crate) interfaces: Vec<InterfaceInstance>,
    pub(crate) instances: Vec<Instance>,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            name: ArcStr::default(),
            owner: Owner::fresh(),
            signals: Vec::new(),
            interfaces: Vec::new(),
            instances: Vec::new(),
        }
    }
}

impl Module {
    /// Creates a new, empty module.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The name of the module.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Adds a signal or port, returning its ID.
    pub fn add_signal(&mut self, signal: Signal) -> SignalId {
        let id = SignalId {
            owner: self.owner,
            index: self.signals.len(),
        };
        self.signals.push(signal);
        id
    }

    /// Adds a port, returning its ID.
    #[inline]
    pub fn add_port(&mut self, name: impl Into<ArcStr>, width: usize, dir: PortDir) -> SignalId {
        self.add_signal(Signal::port(name, width, dir))
    }

    /// Adds an interface instance, returning its ID.
    pub fn add_interface(&mut self, interface: InterfaceInstance) -> InterfaceInstId {
        let id = InterfaceInstId {
            owner: self.owner,
            index: self.interfaces.len(),
        };
        self.interfaces.push(interface);
        id
    }

    /// Adds an instance.
    pub fn add_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// The signal with the given ID, or `None` if the ID belongs to another module.
    #[inline]
    pub fn signal(&self, id: SignalId) -> Option<&Signal> {
        if id.owner != self.owner {
            return None;
        }
        self.signals.get(id.index)
    }

    /// All signals and ports, in declaration order.
    pub fn signals(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.signals
            .iter()
            .enumerate()
            .map(|(index, s)| {
                let id = SignalId {
                    owner: self.owner,
                    index,
                };
                (id, s)
            })
    }

    /// The ports, in declaration order.
    pub fn ports(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.signals().filter(|(_, s)| s.is_port())
    }

    /// The internal signals, in declaration order.
    pub fn internal_signals(&self) -> impl Iterator<Item = (SignalId, &Signal)> {
        self.signals().filter(|(_, s)| !s.is_port())
    }

    /// Looks up a signal by name.
    pub fn signal_named(&self, name: &str) -> Option<SignalId> {
        self.signals()
            .find(|(_, s)| s.name.as_deref() == Some(name))
            .map(|(id, _)| id)
    }

    /// The interface instance with the given ID,
    /// or `None` if the ID belongs to another module.
    #[inline]
    pub fn interface(&self, id: InterfaceInstId) -> Option<&InterfaceInstance> {
        if id.owner != self.owner {
            return None;
        }
        self.interfaces.get(id.index)
    }

    /// All interface instances, in declaration order.
    #[inline]
    pub fn interfaces(&self) -> &[InterfaceInstance] {
        &self.interfaces
    }

    /// All instances, in declaration order.
    #[inline]
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Looks up an instance by name.
    pub fn instance_named(&self, name: &str) -> Option<&Instance> {
        self.instances
            .iter()
            .find(|inst| inst.name.as_deref() == Some(name))
    }

    /// The ports of this module as seen by its instantiators:
    /// signal ports followed by interface ports.
    pub fn port_info(&self) -> Vec<PortInfo> {
        self.ports()
            .map(|(_, s)| PortInfo::from_signal(s))
            .chain(self.interfaces.iter().filter(|i| i.port).map(|i| PortInfo {
                name: i.name.clone(),
                width: i.of.width(),
                direction: PortDir::None,
                polymorphic: false,
                interface: Some(i.of.clone()),
            }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn connection_widths_and_bits() {
        let mut m = Module::new("m");
        let a = m.add_signal(Signal::new("a", 4));
        let b = m.add_signal(Signal::new("b", 1));

        let conn = Connectable::concat([Connectable::slice(a, 1..3), b.into()]);
        assert_eq!(conn.width(&m), Some(3));
        assert_eq!(conn.bits(&m).unwrap(), vec![(a, 1), (a, 2), (b, 0)]);

        assert_eq!(Connectable::slice(a, 2..5).width(&m), None);
        let unknown = SignalId {
            owner: m.owner,
            index: 7,
        };
        assert_eq!(Connectable::Signal(unknown).width(&m), None);
        assert_eq!(Connectable::noconn().width(&m), None);
    }

    #[test]
    fn ids_only_resolve_in_their_own_module() {
        let mut top = Module::new("top");
        let a = top.add_signal(Signal::new("a", 1));
        top.add_signal(Signal::new("b", 1));
        let mut other = Module::new("other");
        other.add_signal(Signal::new("x", 1));
        let y = other.add_signal(Signal::new("y", 1));
        let bus = Arc::new(Interface::new("bus").signal("req", 1, PortDir::Output));
        let link = other.add_interface(InterfaceInstance::new("link", bus));

        assert_eq!(y.index(), 1);
        assert!(top.signal(y).is_none());
        assert_eq!(Connectable::from(y).bits(&top), None);
        assert!(top.interface(link).is_none());
        assert_eq!(other.signal(y).and_then(|s| s.name()).map(|n| n.as_str()), Some("y"));

        let copy = top.clone();
        assert_eq!(copy.signal(a).and_then(|s| s.name()).map(|n| n.as_str()), Some("a"));
    }

    #[test]
    fn from_bits_merges_runs() {
        let mut m = Module::new("m");
        let a = m.add_signal(Signal::new("a", 4));
        let b = m.add_signal(Signal::new("b", 2));

        assert_eq!(
            Connectable::from_bits(&[(a, 0), (a, 1), (a, 2), (a, 3)], &m),
            Connectable::Signal(a)
        );
        assert_eq!(
            Connectable::from_bits(&[(a, 2), (a, 3)], &m),
            Connectable::slice(a, 2..4)
        );
        assert_eq!(
            Connectable::from_bits(&[(a, 3), (b, 0), (b, 1)], &m),
            Connectable::Concat(vec![Connectable::slice(a, 3..4), Connectable::Signal(b)])
        );
    }

    #[test]
    fn ports_precede_interface_ports() {
        let bus = Arc::new(
            Interface::new("bus")
                .signal("req", 1, PortDir::Output)
                .signal("data", 8, PortDir::Output),
        );
        let mut m = Module::new("m");
        m.add_interface(InterfaceInstance::port("host", bus));
        m.add_port("clk", 1, PortDir::Input);
        m.add_signal(Signal::new("x", 1));

        let ports = m.port_info();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[0].name, "clk");
        assert_eq!(ports[1].name, "host");
        assert_eq!(ports[1].width, 9);
        assert!(ports[1].interface.is_some());
    }
}
