//! Mappings from primitives to process-specific devices.

use std::path::PathBuf;

use arcstr::ArcStr;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::params::ParamValue;
use crate::primitives::PrimitiveCall;

/// A model file to include at the top of a netlist.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Include {
    /// The path to the included file.
    pub path: PathBuf,
    /// The library section to include, if any.
    pub section: Option<ArcStr>,
}

impl Include {
    /// Creates a new include with no section.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            section: None,
        }
    }

    /// Selects a library section.
    pub fn section(mut self, section: impl Into<ArcStr>) -> Self {
        self.section = Some(section.into());
        self
    }
}

/// Intrinsic netlist elements.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ElementKind {
    /// A resistor.
    Resistor,
    /// A capacitor.
    Capacitor,
    /// An inductor.
    Inductor,
    /// An independent voltage source.
    VoltageSource,
    /// An independent current source.
    CurrentSource,
    /// A diode.
    Diode,
}

impl ElementKind {
    /// The SPICE instance name prefix for this element.
    pub fn spice_prefix(&self) -> char {
        match self {
            Self::Resistor => 'r',
            Self::Capacitor => 'c',
            Self::Inductor => 'l',
            Self::VoltageSource => 'v',
            Self::CurrentSource => 'i',
            Self::Diode => 'd',
        }
    }
}

/// How a primitive appears in a netlist.
///
/// Ports are always connected in the primitive's declared port order.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum DeviceRender {
    /// A call to a PDK subcircuit.
    Subckt {
        /// The subcircuit name.
        name: ArcStr,
        /// Parameters, in rendering order.
        params: Vec<(ArcStr, ParamValue)>,
    },
    /// An intrinsic element.
    Element {
        /// The element kind.
        kind: ElementKind,
        /// The device model, if the element takes one.
        model: Option<ArcStr>,
        /// Parameters, in rendering order.
        params: Vec<(ArcStr, ParamValue)>,
    },
}

impl DeviceRender {
    /// The parameters, in rendering order.
    pub fn params(&self) -> &[(ArcStr, ParamValue)] {
        match self {
            Self::Subckt { params, .. } | Self::Element { params, .. } => params,
        }
    }
}

/// A process design kit's mapping from primitives to devices.
pub trait PdkMapping: Send + Sync {
    /// The name of the PDK.
    fn name(&self) -> ArcStr;

    /// Maps a primitive call to a device.
    ///
    /// Returns [`Error::UnsupportedDeviceVariant`] if the PDK has no matching device.
    fn map(&self, primitive: &PrimitiveCall) -> Result<DeviceRender>;

    /// Model files to include in every netlist using this PDK.
    fn includes(&self) -> Vec<Include> {
        Vec::new()
    }
}

/// Builds an [`Error::UnsupportedDeviceVariant`] for `primitive`.
pub fn unsupported(pdk: &dyn PdkMapping, primitive: &PrimitiveCall) -> Error {
    Error::UnsupportedDeviceVariant {
        pdk: pdk.name(),
        primitive: ArcStr::from(primitive.kind().name()),
        params: primitive.params_summary(),
    }
}

/// A technology-independent mapping that supports only ideal elements.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Ideal;

fn element(kind: ElementKind, key: &'static str, value: Decimal) -> DeviceRender {
    DeviceRender::Element {
        kind,
        model: None,
        params: vec![(ArcStr::from(key), ParamValue::Decimal(value))],
    }
}

impl PdkMapping for Ideal {
    fn name(&self) -> ArcStr {
        arcstr::literal!("ideal")
    }

    fn map(&self, primitive: &PrimitiveCall) -> Result<DeviceRender> {
        Ok(match primitive {
            PrimitiveCall::IdealResistor(r) => element(ElementKind::Resistor, "r", *r),
            PrimitiveCall::IdealCapacitor(c) => element(ElementKind::Capacitor, "c", *c),
            PrimitiveCall::IdealInductor(l) => element(ElementKind::Inductor, "l", *l),
            PrimitiveCall::DcVoltageSource(v) => element(ElementKind::VoltageSource, "dc", *v),
            PrimitiveCall::DcCurrentSource(i) => element(ElementKind::CurrentSource, "dc", *i),
            PrimitiveCall::Short => element(ElementKind::Resistor, "r", Decimal::ZERO),
            PrimitiveCall::Diode(params) if params.model.is_some() => DeviceRender::Element {
                kind: ElementKind::Diode,
                model: params.model.clone(),
                params: Vec::new(),
            },
            other => return Err(unsupported(self, other)),
        })
    }
}
