//! Primitive devices.
//!
//! Primitives are leaves of the instantiation graph: they have a fixed,
//! ordered list of single-bit ports and a parameter record, and no internal
//! structure. PDK mappings translate them into netlist devices.

use std::fmt::Display;

use arcstr::ArcStr;
use derive_builder::Builder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// MOS transistor polarity.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum MosType {
    /// An n-channel device.
    #[default]
    Nmos,
    /// A p-channel device.
    Pmos,
}

/// MOS threshold voltage flavors.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum MosVth {
    /// Standard threshold.
    #[default]
    Std,
    /// Low threshold.
    Low,
    /// High threshold.
    High,
    /// Ultra-low threshold.
    UltraLow,
    /// Zero threshold.
    Zero,
    /// Native (unimplanted) device.
    Native,
}

/// MOS device families.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum MosFamily {
    /// No family specified. PDKs choose their core devices.
    #[default]
    None,
    /// Core (thin-oxide) devices.
    Core,
    /// I/O (thick-oxide) devices.
    Io,
    /// Low-threshold family.
    Lvt,
    /// High-threshold family.
    Hvt,
}

/// Bipolar transistor polarity.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum BipolarType {
    /// An NPN device.
    #[default]
    Npn,
    /// A PNP device.
    Pnp,
}

/// MOS transistor parameters.
///
/// Dimensions are in meters.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
pub struct MosParams {
    /// Device width.
    #[builder(setter(into, strip_option))]
    pub w: Option<Decimal>,
    /// Device length.
    #[builder(setter(into, strip_option))]
    pub l: Option<Decimal>,
    /// Number of series fingers.
    pub nser: u64,
    /// Number of parallel fingers.
    pub npar: u64,
    /// Multiplier.
    pub mult: u64,
    /// Polarity.
    pub tp: MosType,
    /// Threshold flavor.
    pub vth: MosVth,
    /// Device family.
    pub family: MosFamily,
    /// A PDK-specific device key that overrides type-based selection.
    #[builder(setter(into, strip_option))]
    pub model: Option<ArcStr>,
}

impl Default for MosParams {
    fn default() -> Self {
        Self {
            w: None,
            l: None,
            nser: 1,
            npar: 1,
            mult: 1,
            tp: MosType::default(),
            vth: MosVth::default(),
            family: MosFamily::default(),
            model: None,
        }
    }
}

impl MosParams {
    /// Returns a new [`MosParamsBuilder`].
    #[inline]
    pub fn builder() -> MosParamsBuilder {
        MosParamsBuilder::default()
    }
}

/// Parameters of a physical (PDK-defined) resistor.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
pub struct PhysicalResistorParams {
    /// Width in meters.
    #[builder(setter(into, strip_option))]
    pub w: Option<Decimal>,
    /// Length in meters.
    #[builder(setter(into, strip_option))]
    pub l: Option<Decimal>,
    /// The PDK device key.
    #[builder(setter(into, strip_option))]
    pub model: Option<ArcStr>,
}

impl PhysicalResistorParams {
    /// Returns a new [`PhysicalResistorParamsBuilder`].
    #[inline]
    pub fn builder() -> PhysicalResistorParamsBuilder {
        PhysicalResistorParamsBuilder::default()
    }
}

/// Parameters of a physical (PDK-defined) capacitor.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
pub struct PhysicalCapacitorParams {
    /// Width in meters.
    #[builder(setter(into, strip_option))]
    pub w: Option<Decimal>,
    /// Length in meters.
    #[builder(setter(into, strip_option))]
    pub l: Option<Decimal>,
    /// Multiplier.
    pub mult: u64,
    /// The PDK device key.
    #[builder(setter(into, strip_option))]
    pub model: Option<ArcStr>,
}

impl Default for PhysicalCapacitorParams {
    fn default() -> Self {
        Self {
            w: None,
            l: None,
            mult: 1,
            model: None,
        }
    }
}

impl PhysicalCapacitorParams {
    /// Returns a new [`PhysicalCapacitorParamsBuilder`].
    #[inline]
    pub fn builder() -> PhysicalCapacitorParamsBuilder {
        PhysicalCapacitorParamsBuilder::default()
    }
}

/// Diode parameters.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
pub struct DiodeParams {
    /// Width in meters.
    #[builder(setter(into, strip_option))]
    pub w: Option<Decimal>,
    /// Length in meters.
    #[builder(setter(into, strip_option))]
    pub l: Option<Decimal>,
    /// The diode model or PDK device key.
    #[builder(setter(into, strip_option))]
    pub model: Option<ArcStr>,
}

impl DiodeParams {
    /// Returns a new [`DiodeParamsBuilder`].
    #[inline]
    pub fn builder() -> DiodeParamsBuilder {
        DiodeParamsBuilder::default()
    }
}

/// Bipolar transistor parameters.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default)]
pub struct BipolarParams {
    /// Polarity.
    pub tp: BipolarType,
    /// Multiplier.
    pub mult: u64,
    /// The PDK device key.
    #[builder(setter(into, strip_option))]
    pub model: Option<ArcStr>,
}

impl Default for BipolarParams {
    fn default() -> Self {
        Self {
            tp: BipolarType::default(),
            mult: 1,
            model: None,
        }
    }
}

impl BipolarParams {
    /// Returns a new [`BipolarParamsBuilder`].
    #[inline]
    pub fn builder() -> BipolarParamsBuilder {
        BipolarParamsBuilder::default()
    }
}

/// The kinds of primitive device.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PrimitiveKind {
    /// A MOS transistor.
    Mos,
    /// An ideal resistor.
    IdealResistor,
    /// An ideal capacitor.
    IdealCapacitor,
    /// An ideal inductor.
    IdealInductor,
    /// A two-terminal physical resistor.
    PhysicalResistor,
    /// A physical resistor with a body terminal.
    ThreeTerminalResistor,
    /// A two-terminal physical capacitor.
    PhysicalCapacitor,
    /// A physical capacitor with a body terminal.
    ThreeTerminalCapacitor,
    /// A diode.
    Diode,
    /// A bipolar transistor.
    Bipolar,
    /// A DC voltage source.
    DcVoltageSource,
    /// A DC current source.
    DcCurrentSource,
    /// A zero-ohm short between two nets.
    Short,
}

const TWO_TERMINAL: &[&str] = &["p", "n"];
const THREE_TERMINAL: &[&str] = &["p", "n", "b"];

impl PrimitiveKind {
    /// The name of this primitive kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mos => "Mos",
            Self::IdealResistor => "IdealResistor",
            Self::IdealCapacitor => "IdealCapacitor",
            Self::IdealInductor => "IdealInductor",
            Self::PhysicalResistor => "PhysicalResistor",
            Self::ThreeTerminalResistor => "ThreeTerminalResistor",
            Self::PhysicalCapacitor => "PhysicalCapacitor",
            Self::ThreeTerminalCapacitor => "ThreeTerminalCapacitor",
            Self::Diode => "Diode",
            Self::Bipolar => "Bipolar",
            Self::DcVoltageSource => "DcVoltageSource",
            Self::DcCurrentSource => "DcCurrentSource",
            Self::Short => "Short",
        }
    }

    /// The ordered port list. Every port is a single-bit inout.
    pub fn ports(&self) -> &'static [&'static str] {
        match self {
            Self::Mos => &["d", "g", "s", "b"],
            Self::Bipolar => &["c", "b", "e"],
            Self::ThreeTerminalResistor | Self::ThreeTerminalCapacitor => THREE_TERMINAL,
            _ => TWO_TERMINAL,
        }
    }
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A primitive bound to a concrete parameter value.
///
/// Values of ideal elements are in SI base units (ohms, farads, henries, volts, amperes).
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveCall {
    /// A MOS transistor.
    Mos(MosParams),
    /// An ideal resistor of the given resistance.
    IdealResistor(Decimal),
    /// An ideal capacitor of the given capacitance.
    IdealCapacitor(Decimal),
    /// An ideal inductor of the given inductance.
    IdealInductor(Decimal),
    /// A two-terminal physical resistor.
    PhysicalResistor(PhysicalResistorParams),
    /// A three-terminal physical resistor.
    ThreeTerminalResistor(PhysicalResistorParams),
    /// A two-terminal physical capacitor.
    PhysicalCapacitor(PhysicalCapacitorParams),
    /// A three-terminal physical capacitor.
    ThreeTerminalCapacitor(PhysicalCapacitorParams),
    /// A diode.
    Diode(DiodeParams),
    /// A bipolar transistor.
    Bipolar(BipolarParams),
    /// A DC voltage source of the given voltage.
    DcVoltageSource(Decimal),
    /// A DC current source of the given current.
    DcCurrentSource(Decimal),
    /// A short.
    Short,
}

impl PrimitiveCall {
    /// The kind of primitive being called.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Self::Mos(_) => PrimitiveKind::Mos,
            Self::IdealResistor(_) => PrimitiveKind::IdealResistor,
            Self::IdealCapacitor(_) => PrimitiveKind::IdealCapacitor,
            Self::IdealInductor(_) => PrimitiveKind::IdealInductor,
            Self::PhysicalResistor(_) => PrimitiveKind::PhysicalResistor,
            Self::ThreeTerminalResistor(_) => PrimitiveKind::ThreeTerminalResistor,
            Self::PhysicalCapacitor(_) => PrimitiveKind::PhysicalCapacitor,
            Self::ThreeTerminalCapacitor(_) => PrimitiveKind::ThreeTerminalCapacitor,
            Self::Diode(_) => PrimitiveKind::Diode,
            Self::Bipolar(_) => PrimitiveKind::Bipolar,
            Self::DcVoltageSource(_) => PrimitiveKind::DcVoltageSource,
            Self::DcCurrentSource(_) => PrimitiveKind::DcCurrentSource,
            Self::Short => PrimitiveKind::Short,
        }
    }

    /// The ordered port list of the underlying primitive.
    #[inline]
    pub fn ports(&self) -> &'static [&'static str] {
        self.kind().ports()
    }

    /// A human-readable rendering of the parameters, used in diagnostics.
    pub fn params_summary(&self) -> String {
        match self {
            Self::Mos(p) => format!("{p:?}"),
            Self::IdealResistor(v)
            | Self::IdealCapacitor(v)
            | Self::IdealInductor(v)
            | Self::DcVoltageSource(v)
            | Self::DcCurrentSource(v) => v.normalize().to_string(),
            Self::PhysicalResistor(p) | Self::ThreeTerminalResistor(p) => format!("{p:?}"),
            Self::PhysicalCapacitor(p) | Self::ThreeTerminalCapacitor(p) => format!("{p:?}"),
            Self::Diode(p) => format!("{p:?}"),
            Self::Bipolar(p) => format!("{p:?}"),
            Self::Short => "{}".to_string(),
        }
    }
}
