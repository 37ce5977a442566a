//! Signals and port directions.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// The module that allocated a [`SignalId`] or
/// [`InterfaceInstId`](crate::interface::InterfaceInstId).
///
/// Every new module draws a fresh owner. Clones of a module keep theirs,
/// so IDs stay valid in the elaborated copy of a module.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub(crate) struct Owner(u64);

impl Owner {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// An opaque signal identifier.
///
/// A signal ID is only meaningful within the [`Module`](crate::module::Module)
/// that created it. Looking it up in any other module finds nothing.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct SignalId {
    pub(crate) owner: Owner,
    pub(crate) index: usize,
}

impl SignalId {
    /// The position of the signal in its module's declaration order.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Display for SignalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// Whether a signal is visible outside its module.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum Visibility {
    /// Only visible within the owning module.
    #[default]
    Internal,
    /// Part of the owning module's port list.
    Port,
}

/// Port directions.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum PortDir {
    /// No direction. Treated like [`PortDir::Inout`] by driver analysis.
    #[default]
    None,
    /// An input port.
    Input,
    /// An output port.
    Output,
    /// A bidirectional port.
    Inout,
}

impl PortDir {
    /// Swaps [`PortDir::Input`] and [`PortDir::Output`].
    pub fn flip(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
            other => other,
        }
    }
}

impl Display for PortDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
            Self::Inout => write!(f, "inout"),
        }
    }
}

/// A named, possibly multi-bit wire owned by a single module.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub(crate) name: Option<ArcStr>,
    pub(crate) width: usize,
    pub(crate) visibility: Visibility,
    pub(crate) direction: PortDir,
    pub(crate) polymorphic: bool,
}

impl Signal {
    /// Creates a new internal signal.
    pub fn new(name: impl Into<ArcStr>, width: usize) -> Self {
        Self {
            name: Some(name.into()),
            width,
            visibility: Visibility::Internal,
            direction: PortDir::None,
            polymorphic: false,
        }
    }

    /// Creates a new internal signal whose name is assigned during elaboration.
    pub fn anonymous(width: usize) -> Self {
        Self {
            name: None,
            width,
            visibility: Visibility::Internal,
            direction: PortDir::None,
            polymorphic: false,
        }
    }

    /// Creates a new port.
    pub fn port(name: impl Into<ArcStr>, width: usize, direction: PortDir) -> Self {
        Self {
            name: Some(name.into()),
            width,
            visibility: Visibility::Port,
            direction,
            polymorphic: false,
        }
    }

    /// Creates a new input port.
    #[inline]
    pub fn input(name: impl Into<ArcStr>, width: usize) -> Self {
        Self::port(name, width, PortDir::Input)
    }

    /// Creates a new output port.
    #[inline]
    pub fn output(name: impl Into<ArcStr>, width: usize) -> Self {
        Self::port(name, width, PortDir::Output)
    }

    /// Creates a new inout port.
    #[inline]
    pub fn inout(name: impl Into<ArcStr>, width: usize) -> Self {
        Self::port(name, width, PortDir::Inout)
    }

    /// Marks this port as accepting connections of any width.
    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    /// The name of the signal, if one has been assigned.
    #[inline]
    pub fn name(&self) -> Option<&ArcStr> {
        self.name.as_ref()
    }

    /// The width of the signal in bits.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// The visibility of the signal.
    #[inline]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// The port direction. Only meaningful for ports.
    #[inline]
    pub fn direction(&self) -> PortDir {
        self.direction
    }

    /// Returns `true` if this signal is a port.
    #[inline]
    pub fn is_port(&self) -> bool {
        self.visibility == Visibility::Port
    }

    /// Returns `true` if this port accepts connections of any width.
    #[inline]
    pub fn is_polymorphic(&self) -> bool {
        self.polymorphic
    }
}
