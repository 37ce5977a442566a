//! Interfaces: reusable, named bundles of signals.

use std::fmt::Display;
use std::sync::Arc;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

use crate::signal::{Owner, PortDir};

/// A member of an [`Interface`].
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSignal {
    pub(crate) name: ArcStr,
    pub(crate) width: usize,
    pub(crate) direction: PortDir,
}

impl InterfaceSignal {
    /// The member name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The member width in bits.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// The member direction, as seen from a non-flipped port.
    #[inline]
    pub fn direction(&self) -> PortDir {
        self.direction
    }
}

/// A named, ordered collection of signals.
///
/// Interfaces have no elaboration semantics of their own.
/// During elaboration, each [`InterfaceInstance`] is replaced by
/// one signal per member, named `<instance>_<member>`.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    name: ArcStr,
    signals: Vec<InterfaceSignal>,
}

impl Interface {
    /// Creates a new interface with no members.
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            signals: Vec::new(),
        }
    }

    /// Adds a member signal.
    pub fn signal(mut self, name: impl Into<ArcStr>, width: usize, direction: PortDir) -> Self {
        self.signals.push(InterfaceSignal {
            name: name.into(),
            width,
            direction,
        });
        self
    }

    /// The name of the interface.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The members of the interface, in declaration order.
    #[inline]
    pub fn signals(&self) -> &[InterfaceSignal] {
        &self.signals
    }

    /// The total width of all members.
    pub fn width(&self) -> usize {
        self.signals.iter().map(|s| s.width).sum()
    }
}

/// An opaque interface instance identifier, local to its module.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct InterfaceInstId {
    pub(crate) owner: Owner,
    pub(crate) index: usize,
}

impl Display for InterfaceInstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// An instance of an [`Interface`] within a module.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct InterfaceInstance {
    pub(crate) name: ArcStr,
    pub(crate) of: Arc<Interface>,
    pub(crate) port: bool,
    pub(crate) flipped: bool,
}

impl InterfaceInstance {
    /// Creates an internal interface instance.
    pub fn new(name: impl Into<ArcStr>, of: Arc<Interface>) -> Self {
        Self {
            name: name.into(),
            of,
            port: false,
            flipped: false,
        }
    }

    /// Creates an interface instance that is exposed as a port.
    pub fn port(name: impl Into<ArcStr>, of: Arc<Interface>) -> Self {
        Self {
            port: true,
            ..Self::new(name, of)
        }
    }

    /// Swaps the input and output directions of every member.
    pub fn flipped(mut self) -> Self {
        self.flipped = !self.flipped;
        self
    }

    /// The instance name.
    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// The instantiated interface.
    #[inline]
    pub fn of(&self) -> &Arc<Interface> {
        &self.of
    }

    /// Returns `true` if this instance is part of the module's port list.
    #[inline]
    pub fn is_port(&self) -> bool {
        self.port
    }

    /// Returns `true` if member directions are flipped.
    #[inline]
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }
}
