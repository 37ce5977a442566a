//! Resistors, capacitors, diodes, and bipolar transistors.
//!
//! These devices have no type-based selection: each is chosen by the
//! device key in its parameters' `model` field.

use std::sync::Arc;

use arcstr::ArcStr;
use hdl::module::{ExternalModule, ExternalModuleCall};
use hdl::pdk::DeviceRender;
use hdl::primitives::{
    BipolarParams, BipolarType, DiodeParams, PhysicalCapacitorParams, PhysicalResistorParams,
};
use hdl::{ParamValue, PortDir};
use lazy_static::lazy_static;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{to_microns, InvalidParams, PDK_NAME};

/// A resistor of the Sky 130 PDK.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Resistor {
    /// The device key.
    pub key: &'static str,
    /// The foundry subcircuit.
    pub subckt: &'static str,
    /// Whether the device has a body terminal.
    pub three_terminal: bool,
    /// How the device is sized.
    pub sizing: ResistorSizing,
}

/// How a resistor is sized.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ResistorSizing {
    /// Width and length are free, with the given defaults in microns.
    Generic {
        /// The default width.
        w: Decimal,
        /// The default length.
        l: Decimal,
    },
    /// Only the length is rendered, fixed at the given value in microns.
    Precision {
        /// The fixed length.
        l: Decimal,
    },
}

fn generic(
    key: &'static str,
    subckt: &'static str,
    three_terminal: bool,
    w: Decimal,
    l: Decimal,
) -> Resistor {
    Resistor {
        key,
        subckt,
        three_terminal,
        sizing: ResistorSizing::Generic { w, l },
    }
}

fn precision(key: &'static str, subckt: &'static str, l: Decimal) -> Resistor {
    Resistor {
        key,
        subckt,
        three_terminal: true,
        sizing: ResistorSizing::Precision { l },
    }
}

lazy_static! {
    /// All resistors.
    pub static ref RESISTORS: Vec<Resistor> = vec![
        generic("GEN_PO", "sky130_fd_pr__res_generic_po", false, dec!(0.720), dec!(0.290)),
        generic("GEN_LI", "sky130_fd_pr__res_generic_l1", false, dec!(0.720), dec!(0.290)),
        generic("GEN_M1", "sky130_fd_pr__res_generic_m1", false, dec!(0.720), dec!(0.290)),
        generic("GEN_M2", "sky130_fd_pr__res_generic_m2", false, dec!(0.720), dec!(0.290)),
        generic("GEN_M3", "sky130_fd_pr__res_generic_m3", false, dec!(0.720), dec!(0.290)),
        generic("GEN_M4", "sky130_fd_pr__res_generic_m4", false, dec!(0.720), dec!(0.290)),
        generic("GEN_M5", "sky130_fd_pr__res_generic_m5", false, dec!(0.720), dec!(0.290)),
        generic("GEN_ND", "sky130_fd_pr__res_generic_nd", true, dec!(0.150), dec!(0.270)),
        generic("GEN_PD", "sky130_fd_pr__res_generic_pd", true, dec!(0.150), dec!(0.270)),
        generic("GEN_ISO_PW", "sky130_fd_pr__res_iso_pw", true, dec!(2.650), dec!(2.650)),
        precision("PP_PREC_0p35", "sky130_fd_pr__res_high_po_0p35", dec!(0.35)),
        precision("PP_PREC_0p69", "sky130_fd_pr__res_high_po_0p69", dec!(0.69)),
        precision("PP_PREC_1p41", "sky130_fd_pr__res_high_po_1p41", dec!(1.41)),
        precision("PP_PREC_2p85", "sky130_fd_pr__res_high_po_2p85", dec!(2.85)),
        precision("PP_PREC_5p30", "sky130_fd_pr__res_high_po_5p3", dec!(5.3)),
        precision("PM_PREC_0p35", "sky130_fd_pr__res_xhigh_po_0p35", dec!(0.35)),
        precision("PM_PREC_0p69", "sky130_fd_pr__res_xhigh_po_0p69", dec!(0.69)),
        precision("PM_PREC_1p41", "sky130_fd_pr__res_xhigh_po_1p41", dec!(1.41)),
        precision("PM_PREC_2p85", "sky130_fd_pr__res_xhigh_po_2p85", dec!(2.85)),
        precision("PM_PREC_5p30", "sky130_fd_pr__res_xhigh_po_5p3", dec!(5.3)),
    ];

    /// All capacitors that primitives map to.
    pub static ref CAPACITORS: Vec<Capacitor> = vec![
        Capacitor {
            key: "MIM_M3",
            subckt: "sky130_fd_pr__cap_mim_m3__base",
            multiplier: "mf",
            size: (dec!(2), dec!(2)),
        },
        Capacitor {
            key: "MIM_M4",
            subckt: "sky130_fd_pr__cap_mim_m4__base",
            multiplier: "mf",
            size: (dec!(2), dec!(2)),
        },
        Capacitor {
            key: "VAR_LVT",
            subckt: "sky130_fd_pr__cap_var_lvt",
            multiplier: "vm",
            size: (dec!(0.18), dec!(0.18)),
        },
        Capacitor {
            key: "VAR_HVT",
            subckt: "sky130_fd_pr__cap_var_hvt",
            multiplier: "vm",
            size: (dec!(0.18), dec!(0.18)),
        },
    ];
}

/// A capacitor of the Sky 130 PDK.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Capacitor {
    /// The device key.
    pub key: &'static str,
    /// The foundry subcircuit.
    pub subckt: &'static str,
    /// The name of the multiplier parameter.
    ///
    /// Varactors, which have a body terminal, use `vm`. MiM capacitors use `mf`.
    pub multiplier: &'static str,
    /// The default width and length, in microns.
    pub size: (Decimal, Decimal),
}

impl Capacitor {
    /// Whether the device has a body terminal.
    pub fn three_terminal(&self) -> bool {
        self.multiplier == "vm"
    }
}

/// Diode keys and their foundry subcircuits.
pub const DIODES: &[(&str, &str)] = &[
    ("PWND_5p5V", "sky130_fd_pr__diode_pw2nd_05v5"),
    ("PWND_11p0V", "sky130_fd_pr__diode_pw2nd_11v0"),
    ("PWND_5p5V_NAT", "sky130_fd_pr__diode_pw2nd_05v5_nvt"),
    ("PWND_5p5V_LVT", "sky130_fd_pr__diode_pw2nd_05v5_lvt"),
    ("PDNW_5p5V", "sky130_fd_pr__diode_pd2nw_05v5"),
    ("PDNW_11p0V", "sky130_fd_pr__diode_pd2nw_11v0"),
    ("PDNW_5p5V_HVT", "sky130_fd_pr__diode_pd2nw_05v5_hvt"),
    ("PDNW_5p5V_LVT", "sky130_fd_pr__diode_pd2nw_05v5_lvt"),
    ("PX_RF_PSNW", "sky130_fd_pr__model__parasitic__rf_diode_ps2nw"),
    ("PX_RF_PWDN", "sky130_fd_pr__model__parasitic__rf_diode_pw2dn"),
    ("PX_PWDN", "sky130_fd_pr__model__parasitic__diode_pw2dn"),
    ("PX_PSDN", "sky130_fd_pr__model__parasitic__diode_ps2dn"),
    ("PX_PSNW", "sky130_fd_pr__model__parasitic__diode_ps2nw"),
];

/// Bipolar keys, their polarities, and their foundry subcircuits.
///
/// The first entry of each polarity is its default device.
pub const BIPOLARS: &[(&str, BipolarType, &str)] = &[
    ("NPN_5p0V", BipolarType::Npn, "sky130_fd_pr__npn_05v5"),
    ("NPN_11p0V", BipolarType::Npn, "sky130_fd_pr__npn_11v0"),
    ("PNP_5p0V", BipolarType::Pnp, "sky130_fd_pr__pnp_05v5"),
];

/// Parallel and perpendicular VPP capacitors, with their number of terminals.
///
/// These have no primitive counterpart; instantiate them through [`vpp`].
pub const VPPS: &[(&str, &str, usize)] = &[
    ("VPP_PARA_1", "sky130_fd_pr__cap_vpp_04p4x04p6_m1m2_noshield_o2", 3),
    ("VPP_PARA_2", "sky130_fd_pr__cap_vpp_02p4x04p6_m1m2_noshield", 3),
    ("VPP_PARA_3", "sky130_fd_pr__cap_vpp_08p6x07p8_m1m2_noshield", 3),
    ("VPP_PARA_4", "sky130_fd_pr__cap_vpp_04p4x04p6_m1m2_noshield", 3),
    ("VPP_PARA_5", "sky130_fd_pr__cap_vpp_11p5x11p7_m1m2_noshield", 3),
    ("VPP_PARA_6", "sky130_fd_pr__cap_vpp_44p7x23p1_pol1m1m2m3m4m5_noshield", 3),
    ("VPP_PARA_7", "sky130_fd_pr__cap_vpp_02p7x06p1_m1m2m3m4_shieldl1_fingercap", 3),
    ("VPP_PARA_8", "sky130_fd_pr__cap_vpp_02p9x06p1_m1m2m3m4_shieldl1_fingercap2", 3),
    ("VPP_PARA_9", "sky130_fd_pr__cap_vpp_02p7x11p1_m1m2m3m4_shieldl1_fingercap", 3),
    ("VPP_PARA_10", "sky130_fd_pr__cap_vpp_02p7x21p1_m1m2m3m4_shieldl1_fingercap", 3),
    ("VPP_PARA_11", "sky130_fd_pr__cap_vpp_02p7x41p1_m1m2m3m4_shieldl1_fingercap", 3),
    ("VPP_PERP_1", "sky130_fd_pr__cap_vpp_11p5x11p7_l1m1m2m3m4_shieldm5", 4),
    ("VPP_PERP_2", "sky130_fd_pr__cap_vpp_11p5x11p7_l1m1m2m3m4_shieldpom5", 4),
    ("VPP_PERP_3", "sky130_fd_pr__cap_vpp_11p5x11p7_m1m2m3m4_shieldl1m5", 4),
    ("VPP_PERP_4", "sky130_fd_pr__cap_vpp_04p4x04p6_m1m2m3_shieldl1m5_floatm4", 4),
    ("VPP_PERP_5", "sky130_fd_pr__cap_vpp_08p6x07p8_m1m2m3_shieldl1m5_floatm4", 4),
    ("VPP_PERP_6", "sky130_fd_pr__cap_vpp_11p5x11p7_m1m2m3_shieldl1m5_floatm4", 4),
    ("VPP_PERP_7", "sky130_fd_pr__cap_vpp_11p5x11p7_l1m1m2m3_shieldm4", 4),
    ("VPP_PERP_8", "sky130_fd_pr__cap_vpp_06p8x06p1_l1m1m2m3_shieldpom4", 4),
    ("VPP_PERP_9", "sky130_fd_pr__cap_vpp_06p8x06p1_m1m2m3_shieldl1m4", 4),
    ("VPP_PERP_10", "sky130_fd_pr__cap_vpp_11p3x11p8_l1m1m2m3m4_shieldm5", 4),
];

fn subckt(name: &str, params: Vec<(ArcStr, ParamValue)>) -> DeviceRender {
    DeviceRender::Subckt {
        name: ArcStr::from(name),
        params,
    }
}

fn one() -> ParamValue {
    ParamValue::Decimal(Decimal::ONE)
}

/// Maps a physical resistor, returning `None` if no device matches.
pub(crate) fn resistor(
    params: &PhysicalResistorParams,
    three_terminal: bool,
) -> Option<DeviceRender> {
    let model = params.model.as_ref()?;
    let device = RESISTORS
        .iter()
        .find(|r| r.key == model.as_str() && r.three_terminal == three_terminal)?;
    let params = match device.sizing {
        ResistorSizing::Generic { w, l } => vec![
            (
                arcstr::literal!("w"),
                params.w.map(to_microns).unwrap_or(w).into(),
            ),
            (
                arcstr::literal!("l"),
                params.l.map(to_microns).unwrap_or(l).into(),
            ),
            (arcstr::literal!("m"), one()),
        ],
        ResistorSizing::Precision { l } => vec![
            (arcstr::literal!("l"), l.into()),
            (arcstr::literal!("mult"), one()),
            (arcstr::literal!("m"), one()),
        ],
    };
    Some(subckt(device.subckt, params))
}

/// Maps a physical capacitor, returning `None` if no device matches.
pub(crate) fn capacitor(
    params: &PhysicalCapacitorParams,
    three_terminal: bool,
) -> Result<Option<DeviceRender>, InvalidParams> {
    let Some(model) = params.model.as_ref() else {
        return Ok(None);
    };
    let Some(device) = CAPACITORS
        .iter()
        .find(|c| c.key == model.as_str() && c.three_terminal() == three_terminal)
    else {
        return Ok(None);
    };
    if params.mult == 0 {
        return Err(InvalidParams("mult must be positive".to_string()));
    }
    let (w, l) = device.size;
    Ok(Some(subckt(
        device.subckt,
        vec![
            (
                arcstr::literal!("w"),
                params.w.map(to_microns).unwrap_or(w).into(),
            ),
            (
                arcstr::literal!("l"),
                params.l.map(to_microns).unwrap_or(l).into(),
            ),
            (
                ArcStr::from(device.multiplier),
                Decimal::from(params.mult).into(),
            ),
        ],
    )))
}

/// Maps a diode, returning `None` if no device matches.
///
/// Sized diodes render their area in square picometers and their
/// perimeter in microns. Unsized diodes take the PDK defaults.
pub(crate) fn diode(params: &DiodeParams) -> Option<DeviceRender> {
    let model = params.model.as_ref()?;
    let (_, name) = DIODES.iter().find(|(key, _)| *key == model.as_str())?;
    let (area, pj) = match (params.w, params.l) {
        (Some(w), Some(l)) => (w * l * dec!(1e12), dec!(2) * (w + l) * dec!(1e6)),
        _ => (dec!(1e12), dec!(4e6)),
    };
    Some(subckt(
        name,
        vec![
            (arcstr::literal!("area"), area.into()),
            (arcstr::literal!("pj"), pj.into()),
        ],
    ))
}

/// Maps a bipolar transistor, returning `None` if no device matches.
///
/// Without a model key, the default device of the requested polarity is used.
pub(crate) fn bipolar(params: &BipolarParams) -> Result<Option<DeviceRender>, InvalidParams> {
    let device = match &params.model {
        Some(model) => BIPOLARS.iter().find(|(key, _, _)| *key == model.as_str()),
        None => BIPOLARS.iter().find(|(_, tp, _)| *tp == params.tp),
    };
    let Some((_, _, name)) = device else {
        return Ok(None);
    };
    if params.mult == 0 {
        return Err(InvalidParams("mult must be positive".to_string()));
    }
    Ok(Some(subckt(
        name,
        vec![(arcstr::literal!("m"), Decimal::from(params.mult).into())],
    )))
}

/// Returns the VPP capacitor with the given key as an external module.
///
/// Parallel devices have ports `p n b`. Perpendicular devices have
/// ports `p n t b`, where `t` and `b` are the top and bottom shields.
pub fn vpp(key: &str) -> Option<Arc<ExternalModule>> {
    let (_, name, terminals) = VPPS.iter().find(|(k, _, _)| *k == key)?;
    let mut module = ExternalModule::new(*name)
        .domain(PDK_NAME)
        .port("p", 1, PortDir::Inout)
        .port("n", 1, PortDir::Inout);
    if *terminals == 4 {
        module = module.port("t", 1, PortDir::Inout);
    }
    Some(Arc::new(module.port("b", 1, PortDir::Inout)))
}

/// Binds a VPP capacitor to its parameters.
///
/// Width and length are in microns. VPP capacitors are fixed layouts,
/// so only their default sizes are meaningful.
pub fn vpp_call(module: &Arc<ExternalModule>, w: Decimal, l: Decimal) -> ExternalModuleCall {
    module.call([
        ("w", ParamValue::from(w)),
        ("l", ParamValue::from(l)),
        ("mult", one()),
        ("m", one()),
    ])
}
