use hdl::pdk::{DeviceRender, ElementKind, PdkMapping};
use hdl::primitives::{
    BipolarParams, BipolarType, DiodeParams, MosFamily, MosParams, MosType, MosVth,
    PhysicalCapacitorParams, PhysicalResistorParams,
};
use hdl::{elaborate, Instance, Module, PortDir, PrimitiveCall};
use netlist::{emit, Format};
use rust_decimal_macros::dec;
use test_log::test;

use crate::corner::Sky130Corner;
use crate::mos::MosKind;
use crate::passives::{vpp, vpp_call};
use crate::Sky130;

/// Netlists a single instance named `dut` whose ports are the top-level ports.
fn netlist_lines(pdk: &Sky130, primitive: PrimitiveCall) -> Vec<String> {
    let mut top = Module::new("top");
    let mut dut = Instance::new("dut", primitive.clone());
    for port in primitive.ports() {
        let signal = top.add_port(*port, 1, PortDir::Inout);
        dut = dut.connect(*port, signal);
    }
    top.add_instance(dut);
    emit(&elaborate(top).unwrap(), Format::Spice, pdk)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn mos(model: Option<&str>) -> PrimitiveCall {
    let mut params = MosParams::builder();
    params.w(dec!(30e-6)).l(dec!(30e-6));
    if let Some(model) = model {
        params.model(model);
    }
    PrimitiveCall::Mos(params.build().unwrap())
}

#[test]
fn core_mosfet_parameters() {
    let lines = netlist_lines(&Sky130::default(), mos(None));
    assert_eq!(lines[5], "+ d g s b ");
    assert_eq!(lines[8], "xdut ");
    assert_eq!(lines[9], "+ d g s b ");
    assert_eq!(lines[10], "+ sky130_fd_pr__nfet_01v8 ");
    assert_eq!(
        lines[11],
        "+ w='30' l='30' nf='1' ad='int((nf+1)/2) * w/nf * 0.29' As='int((nf+2)/2) * w/nf * 0.29' pd='2*int((nf+1)/2) * (w/nf + 0.29)' ps='2*int((nf+2)/2) * (w/nf + 0.29)' nrd='0.29 / w' nrs='0.29 / w' sa='0' sb='0' sd='0' mult='1' m='1' "
    );
}

#[test]
fn high_voltage_mosfet_parameters() {
    let lines = netlist_lines(&Sky130::default(), mos(Some("NMOS_20p0V_STD")));
    assert_eq!(lines[10], "+ sky130_fd_pr__nfet_20v0 ");
    assert_eq!(lines[11], "+ w='30' l='30' m='1' ");
}

#[test]
fn mosfets_are_selected_by_flavor() {
    let select = |tp, vth, family| {
        MosKind::select(&MosParams {
            tp,
            vth,
            family,
            ..Default::default()
        })
    };
    assert_eq!(
        select(MosType::Nmos, MosVth::Std, MosFamily::None),
        Some(MosKind::Nfet01v8)
    );
    assert_eq!(
        select(MosType::Pmos, MosVth::High, MosFamily::Core),
        Some(MosKind::Pfet01v8Hvt)
    );
    assert_eq!(
        select(MosType::Nmos, MosVth::Std, MosFamily::Io),
        Some(MosKind::NfetG5v0d10v5)
    );
    assert_eq!(select(MosType::Nmos, MosVth::UltraLow, MosFamily::Core), None);

    assert_eq!(
        MosKind::from_key("sky130_fd_pr__pfet_01v8_lvt"),
        Some(MosKind::Pfet01v8Lvt)
    );
    assert_eq!(MosKind::from_key("PMOS_1p8V_LOW"), Some(MosKind::Pfet01v8Lvt));
}

#[test]
fn unsized_mosfets_take_default_sizes() {
    let params = MosParams::builder().model("PMOS_5p5V_D16_STD").build().unwrap();
    let render = Sky130::default().map(&PrimitiveCall::Mos(params)).unwrap();
    assert_eq!(render.params()[0].1.to_string(), "5");
    assert_eq!(render.params()[1].1.to_string(), "0.66");
}

#[test]
fn series_fingers_are_rejected() {
    let params = MosParams {
        nser: 2,
        ..Default::default()
    };
    let err = Sky130::default()
        .map(&PrimitiveCall::Mos(params))
        .unwrap_err();
    match err {
        hdl::Error::InvalidDeviceParams { pdk, primitive, .. } => {
            assert_eq!(pdk, "sky130");
            assert_eq!(primitive, "Mos");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn generic_resistor_parameters() {
    let params = PhysicalResistorParams::builder()
        .w(dec!(10e-6))
        .l(dec!(10e-6))
        .model("GEN_PO")
        .build()
        .unwrap();
    let lines = netlist_lines(
        &Sky130::default(),
        PrimitiveCall::PhysicalResistor(params),
    );
    assert_eq!(lines[5], "+ p n ");
    assert_eq!(lines[10], "+ sky130_fd_pr__res_generic_po ");
    assert_eq!(lines[11], "+ w='10' l='10' m='1' ");
}

#[test]
fn precision_resistor_parameters() {
    let params = PhysicalResistorParams::builder()
        .w(dec!(10e-6))
        .l(dec!(10e-6))
        .model("PP_PREC_0p35")
        .build()
        .unwrap();
    let lines = netlist_lines(
        &Sky130::default(),
        PrimitiveCall::ThreeTerminalResistor(params),
    );
    assert_eq!(lines[5], "+ p n b ");
    assert_eq!(lines[10], "+ sky130_fd_pr__res_high_po_0p35 ");
    assert_eq!(lines[11], "+ l='0.35' mult='1' m='1' ");
}

#[test]
fn resistor_terminal_count_must_match() {
    let params = PhysicalResistorParams::builder()
        .model("PP_PREC_0p35")
        .build()
        .unwrap();
    let err = Sky130::default()
        .map(&PrimitiveCall::PhysicalResistor(params))
        .unwrap_err();
    assert!(matches!(err, hdl::Error::UnsupportedDeviceVariant { .. }));
}

#[test]
fn capacitor_parameters() {
    let mim = PhysicalCapacitorParams::builder()
        .w(dec!(3e-6))
        .l(dec!(3e-6))
        .model("MIM_M3")
        .build()
        .unwrap();
    let lines = netlist_lines(&Sky130::default(), PrimitiveCall::PhysicalCapacitor(mim));
    assert_eq!(lines[10], "+ sky130_fd_pr__cap_mim_m3__base ");
    assert_eq!(lines[11], "+ w='3' l='3' mf='1' ");

    let var = PhysicalCapacitorParams::builder()
        .w(dec!(3e-6))
        .l(dec!(3e-6))
        .model("VAR_LVT")
        .build()
        .unwrap();
    let lines = netlist_lines(
        &Sky130::default(),
        PrimitiveCall::ThreeTerminalCapacitor(var),
    );
    assert_eq!(lines[10], "+ sky130_fd_pr__cap_var_lvt ");
    assert_eq!(lines[11], "+ w='3' l='3' vm='1' ");
}

#[test]
fn diode_parameters() {
    let sized = DiodeParams::builder()
        .w(dec!(1e-6))
        .l(dec!(1e-6))
        .model("PWND_5p5V")
        .build()
        .unwrap();
    let lines = netlist_lines(&Sky130::default(), PrimitiveCall::Diode(sized));
    assert_eq!(lines[10], "+ sky130_fd_pr__diode_pw2nd_05v5 ");
    assert_eq!(lines[11], "+ area='1' pj='4' ");

    let r#unsized = DiodeParams::builder().model("PX_PSNW").build().unwrap();
    let render = Sky130::default().map(&PrimitiveCall::Diode(r#unsized)).unwrap();
    assert_eq!(
        render,
        DeviceRender::Subckt {
            name: arcstr::literal!("sky130_fd_pr__model__parasitic__diode_ps2nw"),
            params: vec![
                (arcstr::literal!("area"), dec!(1e12).into()),
                (arcstr::literal!("pj"), dec!(4e6).into()),
            ],
        }
    );
}

#[test]
fn bipolar_parameters() {
    let lines = netlist_lines(
        &Sky130::default(),
        PrimitiveCall::Bipolar(BipolarParams::default()),
    );
    assert_eq!(lines[5], "+ c b e ");
    assert_eq!(lines[10], "+ sky130_fd_pr__npn_05v5 ");
    assert_eq!(lines[11], "+ m='1' ");

    let pnp = BipolarParams::builder().tp(BipolarType::Pnp).build().unwrap();
    let lines = netlist_lines(&Sky130::default(), PrimitiveCall::Bipolar(pnp));
    assert_eq!(lines[10], "+ sky130_fd_pr__pnp_05v5 ");
}

#[test]
fn ideal_elements_pass_through() {
    let render = Sky130::default()
        .map(&PrimitiveCall::IdealResistor(dec!(50)))
        .unwrap();
    assert!(matches!(
        render,
        DeviceRender::Element {
            kind: ElementKind::Resistor,
            model: None,
            ..
        }
    ));
}

#[test]
fn model_library_follows_the_corner() {
    assert!(Sky130::default().includes().is_empty());

    let lines = netlist_lines(&Sky130::open("/pdk"), mos(None));
    assert_eq!(
        lines[3],
        ".LIB \"/pdk/libraries/sky130_fd_pr/latest/models/sky130.lib.spice\" tt"
    );
    assert_eq!(lines[4], "");
    assert_eq!(lines[11], "+ sky130_fd_pr__nfet_01v8 ");

    let pdk = Sky130::builder()
        .open_root_dir("/pdk")
        .corner(Sky130Corner::Ff)
        .build()
        .unwrap();
    let includes = pdk.includes();
    assert_eq!(includes.len(), 1);
    assert_eq!(includes[0].section.as_deref(), Some("ff"));
}

#[test]
fn pdk_is_read_from_config() {
    let config =
        config::Config::from_toml_str("[sky130]\nopen_root_dir = \"/pdk\"\ncorner = \"ss\"\n")
            .unwrap();
    let pdk = Sky130::from_config(&config).unwrap();
    assert_eq!(pdk.corner(), Sky130Corner::Ss);
    assert_eq!(pdk.includes()[0].section.as_deref(), Some("ss"));

    let pdk = Sky130::from_config(&config::Config::new()).unwrap();
    assert_eq!(pdk.corner(), Sky130Corner::Tt);
    assert!(pdk.open_root_dir().is_none());
}

#[test]
fn vpp_capacitors_are_external_modules() {
    let cap = vpp("VPP_PERP_1").unwrap();
    assert_eq!(cap.ports().len(), 4);
    assert_eq!(vpp("VPP_PARA_1").unwrap().ports().len(), 3);
    assert!(vpp("VPP_PERP_11").is_none());

    let mut top = Module::new("top");
    let mut inst = Instance::new("c0", vpp_call(&cap, dec!(11.5), dec!(11.7)));
    for port in ["p", "n", "t", "b"] {
        let signal = top.add_port(port, 1, PortDir::Inout);
        inst = inst.connect(port, signal);
    }
    top.add_instance(inst);
    let netlist = emit(&elaborate(top).unwrap(), Format::Spice, &Sky130::default()).unwrap();
    assert!(netlist.contains(
        "xc0 \n+ p n t b \n+ sky130_fd_pr__cap_vpp_11p5x11p7_l1m1m2m3m4_shieldm5 \n+ w='11.5' l='11.7' mult='1' m='1' \n"
    ));
}
