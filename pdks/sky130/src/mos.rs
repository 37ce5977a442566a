//! MOS devices.

use arcstr::ArcStr;
use hdl::pdk::DeviceRender;
use hdl::primitives::{MosFamily, MosParams, MosType, MosVth};
use hdl::ParamValue;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{to_microns, InvalidParams};

/// How a MOS device's parameters are rendered.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum MosStyle {
    /// Core-style devices, with diffusion geometry expressions.
    Core,
    /// 20V devices, which only take `w`, `l` and `m`.
    HighVoltage,
}

macro_rules! define_mosfets {
    ($({$typ:ident, $key:literal, $doc:literal, $subckt:ident, $tp:ident, $vth:ident, $family:ident, $w:tt, $l:tt, $style:ident}),* $(,)?) => {
        /// An enumeration of Sky 130 MOSFET varieties.
        #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
        pub enum MosKind {
            $(
                #[doc = $doc]
                #[doc = ""]
                #[doc = concat!("Selected by the key `", $key, "`. Produces an instance of `", stringify!($subckt), "`.")]
                $typ,
            )*
        }

        impl MosKind {
            /// All MOSFET varieties, in selection order.
            pub const ALL: &'static [MosKind] = &[$(MosKind::$typ),*];

            /// The key that selects this device through [`MosParams::model`].
            pub fn key(&self) -> &'static str {
                match self {
                    $(MosKind::$typ => $key),*
                }
            }

            /// The name of the foundry subcircuit.
            pub fn subckt(&self) -> ArcStr {
                match self {
                    $(MosKind::$typ => arcstr::literal!(stringify!($subckt))),*
                }
            }

            /// The device polarity, threshold and family.
            pub fn flavor(&self) -> (MosType, MosVth, MosFamily) {
                match self {
                    $(MosKind::$typ => (MosType::$tp, MosVth::$vth, MosFamily::$family)),*
                }
            }

            /// The default width and length, in microns.
            pub fn default_size(&self) -> (Decimal, Decimal) {
                match self {
                    $(MosKind::$typ => (dec!($w), dec!($l))),*
                }
            }

            /// How this device's parameters are rendered.
            pub fn style(&self) -> MosStyle {
                match self {
                    $(MosKind::$typ => MosStyle::$style),*
                }
            }
        }
    };
}

define_mosfets!(
    {Nfet01v8, "NMOS_1p8V_STD", "A core NMOS device.", sky130_fd_pr__nfet_01v8, Nmos, Std, Core, 0.420, 0.150, Core},
    {Nfet01v8Lvt, "NMOS_1p8V_LOW", "A core low-threshold NMOS device.", sky130_fd_pr__nfet_01v8_lvt, Nmos, Low, Core, 0.420, 0.150, Core},
    {Pfet01v8, "PMOS_1p8V_STD", "A core PMOS device.", sky130_fd_pr__pfet_01v8, Pmos, Std, Core, 0.550, 0.150, Core},
    {Pfet01v8Hvt, "PMOS_1p8V_HIGH", "A core high-threshold PMOS device.", sky130_fd_pr__pfet_01v8_hvt, Pmos, High, Core, 0.550, 0.150, Core},
    {Pfet01v8Lvt, "PMOS_1p8V_LOW", "A core low-threshold PMOS device.", sky130_fd_pr__pfet_01v8_lvt, Pmos, Low, Core, 0.550, 0.350, Core},
    {PfetG5v0d10v5, "PMOS_5p5V_D10_STD", "A 5.5V PMOS device.", sky130_fd_pr__pfet_g5v0d10v5, Pmos, Std, Io, 0.420, 0.500, Core},
    {NfetG5v0d10v5, "NMOS_5p5V_D10_STD", "A 5.5V NMOS device.", sky130_fd_pr__nfet_g5v0d10v5, Nmos, Std, Io, 0.420, 0.500, Core},
    {PfetG5v0d16v0, "PMOS_5p5V_D16_STD", "A 5.5V PMOS device with a 16V drain.", sky130_fd_pr__pfet_g5v0d16v0, Pmos, Std, Io, 5.000, 0.660, Core},
    {Nfet20v0, "NMOS_20p0V_STD", "A 20V NMOS device.", sky130_fd_pr__nfet_20v0, Nmos, Std, None, 29.410, 2.950, HighVoltage},
    {Nfet20v0Zvt, "NMOS_20p0V_LOW", "A 20V zero-threshold NMOS device.", sky130_fd_pr__nfet_20v0_zvt, Nmos, Zero, None, 30.000, 1.500, HighVoltage},
    {Nfet20v0Iso, "NMOS_ISO_20p0V", "A 20V isolated NMOS device.", sky130_fd_pr__nfet_20v0_iso, Nmos, Std, None, 30.000, 1.500, HighVoltage},
    {Pfet20v0, "PMOS_20p0V", "A 20V PMOS device.", sky130_fd_pr__pfet_20v0, Pmos, Std, None, 30.000, 1.000, HighVoltage},
    {Nfet03v3Nvt, "NMOS_3p3V_NAT", "A 3.3V native-threshold NMOS device.", sky130_fd_pr__nfet_03v3_nvt, Nmos, Native, None, 0.700, 0.500, Core},
    {Nfet05v0Nvt, "NMOS_5p0V_NAT", "A 5V native-threshold NMOS device.", sky130_fd_pr__nfet_05v0_nvt, Nmos, Native, None, 0.700, 0.900, Core},
    {Nfet20v0Nvt, "NMOS_20p0V_NAT", "A 20V native-threshold NMOS device.", sky130_fd_pr__nfet_20v0_nvt, Nmos, Native, None, 30.000, 1.000, HighVoltage},
    {EsdNfet01v8, "ESD_NMOS_1p8V", "A core ESD NMOS device.", sky130_fd_pr__esd_nfet_01v8, Nmos, Std, Core, 20.350, 0.165, Core},
    {EsdNfetG5v0d10v5, "ESD_NMOS_5p5V_D10", "A 5.5V ESD NMOS device.", sky130_fd_pr__esd_nfet_g5v0d10v5, Nmos, Std, Io, 14.500, 0.550, Core},
    {EsdNfetG5v0d10v5Nvt, "ESD_NMOS_5p5V_NAT", "A 5.5V native-threshold ESD NMOS device.", sky130_fd_pr__esd_nfet_g5v0d10v5_nvt, Nmos, Native, Io, 10.000, 0.900, Core},
    {EsdPfetG5v0d10v5, "ESD_PMOS_5p5V", "A 5.5V ESD PMOS device.", sky130_fd_pr__esd_pfet_g5v0d10v5, Pmos, Std, Io, 14.500, 0.550, Core},
);

impl MosKind {
    /// Looks up a device by key or by subcircuit name.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.key() == key || kind.subckt().as_str() == key)
    }

    /// Selects the device for `params`.
    ///
    /// An explicit model key wins. Otherwise the first device matching the
    /// requested polarity, threshold and family is chosen, with an
    /// unspecified family standing for core devices.
    pub fn select(params: &MosParams) -> Option<Self> {
        if let Some(model) = &params.model {
            return Self::from_key(model);
        }
        let family = match params.family {
            MosFamily::None => MosFamily::Core,
            family => family,
        };
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.flavor() == (params.tp, params.vth, family))
    }
}

pub(crate) fn render(kind: MosKind, params: &MosParams) -> Result<DeviceRender, InvalidParams> {
    if params.nser != 1 {
        return Err(InvalidParams(format!(
            "`{}` has no series fingers, but nser = {}",
            kind.subckt(),
            params.nser
        )));
    }
    if params.npar == 0 || params.mult == 0 {
        return Err(InvalidParams(
            "npar and mult must be positive".to_string(),
        ));
    }
    let (w, l) = kind.default_size();
    let w = params.w.map(to_microns).unwrap_or(w);
    let l = params.l.map(to_microns).unwrap_or(l);
    let mult = ParamValue::Decimal(Decimal::from(params.mult));

    let params = match kind.style() {
        MosStyle::Core => vec![
            (arcstr::literal!("w"), w.into()),
            (arcstr::literal!("l"), l.into()),
            (arcstr::literal!("nf"), Decimal::from(params.npar).into()),
            (
                arcstr::literal!("ad"),
                ParamValue::literal("int((nf+1)/2) * w/nf * 0.29"),
            ),
            (
                arcstr::literal!("As"),
                ParamValue::literal("int((nf+2)/2) * w/nf * 0.29"),
            ),
            (
                arcstr::literal!("pd"),
                ParamValue::literal("2*int((nf+1)/2) * (w/nf + 0.29)"),
            ),
            (
                arcstr::literal!("ps"),
                ParamValue::literal("2*int((nf+2)/2) * (w/nf + 0.29)"),
            ),
            (arcstr::literal!("nrd"), ParamValue::literal("0.29 / w")),
            (arcstr::literal!("nrs"), ParamValue::literal("0.29 / w")),
            (arcstr::literal!("sa"), ParamValue::Int(0)),
            (arcstr::literal!("sb"), ParamValue::Int(0)),
            (arcstr::literal!("sd"), ParamValue::Int(0)),
            (arcstr::literal!("mult"), mult),
            (arcstr::literal!("m"), ParamValue::Int(1)),
        ],
        MosStyle::HighVoltage => vec![
            (arcstr::literal!("w"), w.into()),
            (arcstr::literal!("l"), l.into()),
            (arcstr::literal!("m"), mult),
        ],
    };

    Ok(DeviceRender::Subckt {
        name: kind.subckt(),
        params,
    })
}
