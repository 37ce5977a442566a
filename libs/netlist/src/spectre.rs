//! Spectre netlists.

use std::io::{Result, Write};

use arcstr::ArcStr;
use hdl::pdk::{DeviceRender, ElementKind, Include};
use hdl::ParamValue;
use itertools::Itertools;

use crate::{NetlistOptions, SpiceLikeNetlister};

/// The Spectre netlist format.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Spectre;

/// Each net preceded by a space, for use inside parentheses.
fn net_list(nets: &[ArcStr]) -> String {
    nets.iter().map(|net| format!(" {net}")).join("")
}

impl Spectre {
    fn write_params<W: Write>(out: &mut W, params: &[(ArcStr, ParamValue)]) -> Result<()> {
        for (key, value) in params {
            match value {
                ParamValue::Str(value) => write!(out, " {key}={value:?}")?,
                ParamValue::Literal(expr) => write!(out, " {key}=({expr})")?,
                value => write!(out, " {key}={value}")?,
            }
        }
        Ok(())
    }

    fn write_device<W: Write>(
        out: &mut W,
        name: &ArcStr,
        connections: &[ArcStr],
        device: &str,
        params: &[(ArcStr, ParamValue)],
    ) -> Result<()> {
        write!(out, "{name} ({} ) {device}", net_list(connections))?;
        Self::write_params(out, params)?;
        writeln!(out)
    }
}

fn element_name(kind: ElementKind) -> &'static str {
    match kind {
        ElementKind::Resistor => "resistor",
        ElementKind::Capacitor => "capacitor",
        ElementKind::Inductor => "inductor",
        ElementKind::VoltageSource => "vsource",
        ElementKind::CurrentSource => "isource",
        ElementKind::Diode => "diode",
    }
}

impl SpiceLikeNetlister for Spectre {
    fn write_prelude<W: Write>(&self, out: &mut W, options: &NetlistOptions) -> Result<()> {
        writeln!(out, "// {}\n", options.library_name)?;
        writeln!(out, "simulator lang=spectre\n")?;
        writeln!(out, "// Generated by the hdl netlister")?;
        Ok(())
    }

    fn write_include<W: Write>(&self, out: &mut W, include: &Include) -> Result<()> {
        if let Some(section) = &include.section {
            write!(out, "include {:?} section={}", include.path, section)?;
        } else {
            write!(out, "include {:?}", include.path)?;
        }
        Ok(())
    }

    fn write_start_subckt<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        ports: &[ArcStr],
    ) -> Result<()> {
        writeln!(out, "subckt {name} ({} )", net_list(ports))
    }

    fn write_end_subckt<W: Write>(&self, out: &mut W, name: &ArcStr) -> Result<()> {
        writeln!(out, "ends {name}")?;
        writeln!(out)?;
        Ok(())
    }

    fn write_instance<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        connections: &[ArcStr],
        child: &ArcStr,
        params: &[(ArcStr, ParamValue)],
    ) -> Result<()> {
        write!(out, "  ")?;
        Self::write_device(out, name, connections, child, params)
    }

    fn write_primitive_inst<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        connections: &[ArcStr],
        device: &DeviceRender,
    ) -> Result<()> {
        write!(out, "  ")?;
        match device {
            DeviceRender::Subckt { name: subckt, params } => {
                Self::write_device(out, name, connections, subckt, params)
            }
            DeviceRender::Element {
                kind,
                model,
                params,
            } => {
                let device = model.as_deref().unwrap_or(element_name(*kind));
                Self::write_device(out, name, connections, device, params)
            }
        }
    }
}
