//! The Sky 130 nm process development kit.
//!
//! Maps technology-independent primitives to the foundry's SPICE subcircuits.
#![warn(missing_docs)]

use std::path::PathBuf;

use arcstr::ArcStr;
use derive_builder::Builder;
use hdl::pdk::{DeviceRender, Ideal, Include, PdkMapping};
use hdl::{Error, PrimitiveCall};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::corner::Sky130Corner;
use crate::mos::MosKind;

pub mod corner;
pub mod mos;
pub mod passives;
#[cfg(test)]
mod tests;

/// The name under which this PDK reports devices and errors.
pub const PDK_NAME: &str = "sky130";

/// Converts a length in meters to microns, the unit of all Sky 130 subcircuits.
pub(crate) fn to_microns(meters: Decimal) -> Decimal {
    meters * dec!(1e6)
}

/// A device exists, but cannot take the requested parameters.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct InvalidParams(pub(crate) String);

/// The Sky 130 PDK.
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct Sky130 {
    /// The open PDK root directory.
    ///
    /// Model files are only included when this is set.
    #[builder(setter(into, strip_option), default)]
    open_root_dir: Option<PathBuf>,
    /// The process corner to simulate.
    #[builder(default)]
    corner: Sky130Corner,
}

impl Sky130 {
    /// Returns a new [`Sky130Builder`].
    #[inline]
    pub fn builder() -> Sky130Builder {
        Sky130Builder::default()
    }

    /// Creates an instantiation of the open PDK at the typical corner.
    #[inline]
    pub fn open(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            open_root_dir: Some(root_dir.into()),
            corner: Sky130Corner::default(),
        }
    }

    /// Reads the `sky130` table of `config`, falling back to defaults.
    pub fn from_config(config: &config::Config) -> anyhow::Result<Self> {
        Ok(config.get(PDK_NAME)?.unwrap_or_default())
    }

    /// The open PDK root directory, if any.
    #[inline]
    pub fn open_root_dir(&self) -> Option<&PathBuf> {
        self.open_root_dir.as_ref()
    }

    /// The selected corner.
    #[inline]
    pub fn corner(&self) -> Sky130Corner {
        self.corner
    }
}

impl PdkMapping for Sky130 {
    fn name(&self) -> ArcStr {
        arcstr::literal!("sky130")
    }

    fn map(&self, primitive: &PrimitiveCall) -> hdl::Result<DeviceRender> {
        let rendered = match primitive {
            PrimitiveCall::Mos(params) => MosKind::select(params)
                .map(|kind| mos::render(kind, params))
                .transpose(),
            PrimitiveCall::PhysicalResistor(params) => Ok(passives::resistor(params, false)),
            PrimitiveCall::ThreeTerminalResistor(params) => Ok(passives::resistor(params, true)),
            PrimitiveCall::PhysicalCapacitor(params) => passives::capacitor(params, false),
            PrimitiveCall::ThreeTerminalCapacitor(params) => passives::capacitor(params, true),
            PrimitiveCall::Diode(params) => Ok(passives::diode(params)),
            PrimitiveCall::Bipolar(params) => passives::bipolar(params),
            PrimitiveCall::IdealResistor(_)
            | PrimitiveCall::IdealCapacitor(_)
            | PrimitiveCall::IdealInductor(_)
            | PrimitiveCall::DcVoltageSource(_)
            | PrimitiveCall::DcCurrentSource(_)
            | PrimitiveCall::Short => return Ideal.map(primitive),
        };

        match rendered {
            Ok(Some(render)) => Ok(render),
            Ok(None) => {
                tracing::debug!(primitive = ?primitive, "no matching sky130 device");
                Err(hdl::pdk::unsupported(self, primitive))
            }
            Err(InvalidParams(message)) => Err(Error::InvalidDeviceParams {
                pdk: self.name(),
                primitive: ArcStr::from(primitive.kind().name()),
                message,
            }),
        }
    }

    fn includes(&self) -> Vec<Include> {
        self.open_root_dir
            .as_deref()
            .map(|root| vec![self.corner.include(root)])
            .unwrap_or_default()
    }
}
