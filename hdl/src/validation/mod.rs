//! Connectivity validation.
//!
//! Checks that every instance in a module connects each port of its target
//! exactly once, with a connection of matching width that refers to signals
//! of the enclosing module. Modules that pass these checks then go through
//! per-bit driver analysis.

use std::collections::HashSet;
use std::fmt::Display;
use std::sync::Arc;

use arcstr::ArcStr;
use diagnostics::{Diagnostic, IssueSet, Severity};
use indexmap::IndexMap;
use tracing::{span, Level};

use crate::error::{Error, Result};
use crate::module::{ConnError, Connectable, Instance, Module, PortInfo};
use crate::signal::SignalId;

pub mod drivers;
#[cfg(test)]
mod tests;

pub use drivers::Net;

/// An issue identified during connectivity validation of a module.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ConnectivityError {
    cause: Cause,
    severity: Severity,
}

/// The cause of a [`ConnectivityError`].
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Cause {
    /// Two signals in a module have the same name.
    DuplicateSignalName { module: ArcStr, name: ArcStr },
    /// Two instances in a module have the same name.
    DuplicateInstanceName { module: ArcStr, name: ArcStr },
    /// A signal has zero width.
    ZeroWidthSignal { module: ArcStr, signal: ArcStr },
    /// A connection refers to a signal ID not declared in the module,
    /// such as an ID handed out by another module.
    MissingSignal {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
        signal: SignalId,
    },
    /// A slice extends past the end of its signal, or is empty.
    SliceOutOfBounds {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
        signal: ArcStr,
        start: usize,
        end: usize,
        width: usize,
    },
    /// A port of the instantiated target has no connection.
    UnconnectedPort {
        module: ArcStr,
        instance: ArcStr,
        target: ArcStr,
        port: ArcStr,
    },
    /// A connection names a port the target does not have.
    ExtraPort {
        module: ArcStr,
        instance: ArcStr,
        target: ArcStr,
        port: ArcStr,
    },
    /// A port is connected more than once.
    DuplicateConnection {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
    },
    /// A connection's width differs from the width of its port.
    PortWidthMismatch {
        module: ArcStr,
        instance: ArcStr,
        target: ArcStr,
        port: ArcStr,
        expected: usize,
        actual: usize,
    },
    /// A connection to an instance array is neither as wide as the port
    /// nor as wide as the port times the array length.
    ArrayWidthMismatch {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
        port_width: usize,
        len: usize,
        actual: usize,
    },
    /// An interface connection does not match its port.
    ///
    /// `None` stands for a plain signal connection or port.
    InterfaceMismatch {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
        expected: Option<ArcStr>,
        found: Option<ArcStr>,
    },
    /// A connection refers to an interface instance not declared in the module.
    MissingInterface {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
    },
    /// An interface appears within a concatenation.
    NestedInterface {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
    },
    /// An instance array has zero copies.
    EmptyArray { module: ArcStr, instance: ArcStr },
    /// A port reference was not resolved to a signal,
    /// usually because the referenced instance or port does not exist.
    UnresolvedPortRef {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
        target_instance: ArcStr,
        target_port: ArcStr,
    },
    /// A no-connect port is referenced by, or references, another port.
    ReferencedNoConn {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
    },
    /// A no-connect or port reference appears within a concatenation or slice.
    NestedImplicit {
        module: ArcStr,
        instance: ArcStr,
        port: ArcStr,
    },
    /// An instance still refers to an unexpanded generator.
    UnresolvedGenerator {
        module: ArcStr,
        instance: ArcStr,
        generator: ArcStr,
    },
    /// A net is driven by more than one output.
    MultipleDrivers { net: Net, drivers: usize },
    /// A net is not connected to anything.
    Floating { net: Net },
    /// A net is read, but has no drivers.
    NoDrivers { net: Net },
}

impl Diagnostic for ConnectivityError {
    fn severity(&self) -> Severity {
        self.severity
    }
}

impl ConnectivityError {
    /// Creates a new connectivity error from the given cause and severity.
    pub(crate) fn new(cause: Cause, severity: Severity) -> Self {
        Self { cause, severity }
    }

    /// Gets the underlying cause of this issue.
    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.cause
    }

    /// Creates a new connectivity error and logs it immediately.
    ///
    /// The log level will be selected according to the given severity.
    pub(crate) fn new_and_log(cause: Cause, severity: Severity) -> Self {
        let result = Self::new(cause, severity);
        match severity.as_tracing_level() {
            Level::ERROR => tracing::event!(Level::ERROR, issue = ?result.cause, "{}", result),
            Level::WARN => tracing::event!(Level::WARN, issue = ?result.cause, "{}", result),
            _ => tracing::event!(Level::INFO, issue = ?result.cause, "{}", result),
        }
        result
    }
}

impl Display for ConnectivityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.cause)
    }
}

fn or_signals(name: &Option<ArcStr>) -> String {
    match name {
        Some(name) => format!("interface `{name}`"),
        None => "plain signals".to_string(),
    }
}

impl Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateSignalName { module, name } => write!(
                f,
                "duplicate signal names: found two or more signals named `{name}` in module `{module}`"
            ),
            Self::DuplicateInstanceName { module, name } => write!(
                f,
                "duplicate instance names: found two or more instances named `{name}` in module `{module}`"
            ),
            Self::ZeroWidthSignal { module, signal } => write!(
                f,
                "signal `{signal}` in module `{module}` has zero width"
            ),
            Self::MissingSignal { module, instance, port, signal } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` is connected to undeclared signal ID {signal}"
            ),
            Self::SliceOutOfBounds { module, instance, port, signal, start, end, width } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` is connected to slice [{start}..{end}) of `{signal}`, which has width {width}"
            ),
            Self::UnconnectedPort { module, instance, target, port } => write!(
                f,
                "unconnected port: instance `{instance}` of `{target}` in module `{module}` does not connect port `{port}`"
            ),
            Self::ExtraPort { module, instance, target, port } => write!(
                f,
                "extra port: instance `{instance}` in module `{module}` connects port `{port}`, which does not exist on `{target}`"
            ),
            Self::DuplicateConnection { module, instance, port } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` is connected more than once"
            ),
            Self::PortWidthMismatch { module, instance, target, port, expected, actual } => write!(
                f,
                "mismatched port width: port `{port}` of `{target}` has width {expected}, but instance `{instance}` in module `{module}` connects a signal of width {actual}"
            ),
            Self::ArrayWidthMismatch { module, instance, port, port_width, len, actual } => write!(
                f,
                "mismatched array connection width: port `{port}` of instance array `{instance}` (length {len}) in module `{module}` has width {port_width}, but is connected to a signal of width {actual}"
            ),
            Self::InterfaceMismatch { module, instance, port, expected, found } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` expects {}, but is connected to {}",
                or_signals(expected),
                or_signals(found)
            ),
            Self::MissingInterface { module, instance, port } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` is connected to an undeclared interface"
            ),
            Self::NestedInterface { module, instance, port } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` concatenates an interface"
            ),
            Self::EmptyArray { module, instance } => write!(
                f,
                "instance array `{instance}` in module `{module}` has zero copies"
            ),
            Self::UnresolvedPortRef { module, instance, port, target_instance, target_port } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` is connected to unresolved port reference `{target_instance}.{target_port}`"
            ),
            Self::ReferencedNoConn { module, instance, port } => write!(
                f,
                "no-connect port `{port}` of instance `{instance}` in module `{module}` is joined to another port"
            ),
            Self::NestedImplicit { module, instance, port } => write!(
                f,
                "port `{port}` of instance `{instance}` in module `{module}` nests a no-connect or port reference"
            ),
            Self::UnresolvedGenerator { module, instance, generator } => write!(
                f,
                "instance `{instance}` in module `{module}` refers to unexpanded generator `{generator}`"
            ),
            Self::MultipleDrivers { net, drivers } => {
                write!(f, "multiple drivers: net {net} has {drivers} drivers")
            }
            Self::Floating { net } => write!(f, "floating net: {net} is not connected"),
            Self::NoDrivers { net } => {
                write!(f, "net {net} is used (i.e. read from), but has no drivers")
            }
        }
    }
}

/// Validates the connectivity of `module`.
///
/// Only the module itself is checked, not the modules it instantiates.
/// Driver analysis runs only if the structural checks find no errors.
pub fn validate(module: &Module) -> IssueSet<ConnectivityError> {
    let _guard = span!(Level::INFO, "validating module", module = %module.name).entered();
    let mut issues = IssueSet::new();
    validate_names(module, &mut issues);
    validate_connections(module, &mut issues);
    if !issues.has_error() {
        drivers::validate_drivers(module, &mut issues);
    }
    issues
}

/// Validates `module`, returning [`Error::Connectivity`] if any error is found.
///
/// On success, returns the warnings that were found.
pub fn require_valid(module: &Module) -> Result<IssueSet<ConnectivityError>> {
    validate(module)
        .into_result()
        .map_err(|issues| Error::Connectivity {
            module: module.name.clone(),
            issues,
        })
}

fn validate_names(module: &Module, issues: &mut IssueSet<ConnectivityError>) {
    let _guard = span!(
        Level::INFO,
        "validation pass 1 (checking signal and instance names)"
    )
    .entered();

    let mut signal_names = HashSet::new();
    for (_, signal) in module.signals() {
        if let Some(name) = &signal.name {
            if !signal_names.insert(name.clone()) {
                issues.add(ConnectivityError::new_and_log(
                    Cause::DuplicateSignalName {
                        module: module.name.clone(),
                        name: name.clone(),
                    },
                    Severity::Error,
                ));
            }
        }
        if signal.width == 0 {
            issues.add(ConnectivityError::new_and_log(
                Cause::ZeroWidthSignal {
                    module: module.name.clone(),
                    signal: signal
                        .name
                        .clone()
                        .unwrap_or_else(|| arcstr::literal!("<anonymous>")),
                },
                Severity::Error,
            ));
        }
    }

    let mut instance_names = HashSet::new();
    for inst in module.instances() {
        if let Some(name) = &inst.name {
            if !instance_names.insert(name.clone()) {
                issues.add(ConnectivityError::new_and_log(
                    Cause::DuplicateInstanceName {
                        module: module.name.clone(),
                        name: name.clone(),
                    },
                    Severity::Error,
                ));
            }
        }
    }
}

fn validate_connections(module: &Module, issues: &mut IssueSet<ConnectivityError>) {
    let _guard = span!(
        Level::INFO,
        "validation pass 2 (checking instance connections)"
    )
    .entered();

    for inst in module.instances() {
        let instance = inst.display_name();
        let Some(ports) = inst.of.ports() else {
            issues.add(ConnectivityError::new_and_log(
                Cause::UnresolvedGenerator {
                    module: module.name.clone(),
                    instance,
                    generator: inst.of.name(),
                },
                Severity::Error,
            ));
            continue;
        };
        if inst.array == Some(0) {
            issues.add(ConnectivityError::new_and_log(
                Cause::EmptyArray {
                    module: module.name.clone(),
                    instance,
                },
                Severity::Error,
            ));
            continue;
        }
        validate_instance(module, inst, &instance, &ports, issues);
    }
}

fn validate_instance(
    module: &Module,
    inst: &Instance,
    instance: &ArcStr,
    ports: &[PortInfo],
    issues: &mut IssueSet<ConnectivityError>,
) {
    let target = inst.of.name();
    let len = inst.array.unwrap_or(1);
    // Ports not yet connected, in declaration order.
    let mut pending: IndexMap<&str, &PortInfo> =
        ports.iter().map(|port| (port.name.as_str(), port)).collect();
    let mut connected = HashSet::new();

    for (name, conn) in inst.conns.iter() {
        if !connected.insert(name.as_str()) {
            issues.add(ConnectivityError::new_and_log(
                Cause::DuplicateConnection {
                    module: module.name.clone(),
                    instance: instance.clone(),
                    port: name.clone(),
                },
                Severity::Error,
            ));
            continue;
        }
        let Some(port) = pending.shift_remove(name.as_str()) else {
            issues.add(ConnectivityError::new_and_log(
                Cause::ExtraPort {
                    module: module.name.clone(),
                    instance: instance.clone(),
                    target: target.clone(),
                    port: name.clone(),
                },
                Severity::Error,
            ));
            continue;
        };
        if let Some(cause) = check_connection(module, instance, &target, len, port, conn) {
            issues.add(ConnectivityError::new_and_log(cause, Severity::Error));
        }
    }

    for port in pending.values() {
        issues.add(ConnectivityError::new_and_log(
            Cause::UnconnectedPort {
                module: module.name.clone(),
                instance: instance.clone(),
                target: target.clone(),
                port: port.name.clone(),
            },
            Severity::Error,
        ));
    }
}

/// Checks a single connection, returning the cause of the first problem found.
fn check_connection(
    module: &Module,
    instance: &ArcStr,
    target: &ArcStr,
    len: usize,
    port: &PortInfo,
    conn: &Connectable,
) -> Option<Cause> {
    let module_name = || module.name.clone();

    if let Some(expected) = &port.interface {
        let Connectable::Interface(id) = conn else {
            return Some(Cause::InterfaceMismatch {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
                expected: Some(expected.name().clone()),
                found: None,
            });
        };
        let Some(found) = module.interface(*id) else {
            return Some(Cause::MissingInterface {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
            });
        };
        if !Arc::ptr_eq(found.of(), expected) && found.of() != expected {
            return Some(Cause::InterfaceMismatch {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
                expected: Some(expected.name().clone()),
                found: Some(found.of().name().clone()),
            });
        }
        return None;
    }

    match conn {
        Connectable::NoConn(_) => return None,
        Connectable::Port {
            instance: target_instance,
            port: target_port,
        } => {
            return Some(Cause::UnresolvedPortRef {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
                target_instance: target_instance.clone(),
                target_port: target_port.clone(),
            })
        }
        _ => (),
    }

    if let Connectable::Interface(id) = conn {
        return Some(match module.interface(*id) {
            Some(found) => Cause::InterfaceMismatch {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
                expected: None,
                found: Some(found.of().name().clone()),
            },
            None => Cause::MissingInterface {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
            },
        });
    }

    let actual = match conn.resolve_width(module) {
        Ok(width) => width,
        Err(ConnError::MissingSignal(signal)) => {
            return Some(Cause::MissingSignal {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
                signal,
            })
        }
        Err(ConnError::SliceOutOfBounds {
            signal,
            start,
            end,
            width,
        }) => {
            return Some(Cause::SliceOutOfBounds {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
                signal: module
                    .signal(signal)
                    .and_then(|s| s.name.clone())
                    .unwrap_or_else(|| arcstr::literal!("<anonymous>")),
                start,
                end,
                width,
            })
        }
        Err(ConnError::NestedInterface) => {
            return Some(Cause::NestedInterface {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
            })
        }
        Err(ConnError::Implicit) => {
            return Some(Cause::NestedImplicit {
                module: module_name(),
                instance: instance.clone(),
                port: port.name.clone(),
            })
        }
    };

    if port.polymorphic || actual == port.width {
        return None;
    }
    if len > 1 {
        if actual == port.width * len {
            return None;
        }
        return Some(Cause::ArrayWidthMismatch {
            module: module_name(),
            instance: instance.clone(),
            port: port.name.clone(),
            port_width: port.width,
            len,
            actual,
        });
    }
    Some(Cause::PortWidthMismatch {
        module: module_name(),
        instance: instance.clone(),
        target: target.clone(),
        port: port.name.clone(),
        expected: port.width,
        actual,
    })
}
