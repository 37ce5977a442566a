//! SPICE netlists.
//!
//! Every statement is split across continuation lines, one for each of
//! the ports, the referenced subcircuit or model, and the parameters.

use std::io::{Result, Write};

use arcstr::ArcStr;
use hdl::pdk::{DeviceRender, Include};
use hdl::ParamValue;
use itertools::Itertools;

use crate::{NetlistOptions, SpiceLikeNetlister};

/// The SPICE netlist format.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq)]
pub struct Spice;

impl Spice {
    fn write_connections<W: Write>(out: &mut W, connections: &[ArcStr]) -> Result<()> {
        if connections.is_empty() {
            return writeln!(out, "+ * No ports ");
        }
        writeln!(out, "+ {} ", connections.iter().join(" "))
    }

    fn write_params<W: Write>(out: &mut W, params: &[(ArcStr, ParamValue)]) -> Result<()> {
        if params.is_empty() {
            return writeln!(out, "+ * No parameters ");
        }
        writeln!(
            out,
            "+ {} ",
            params
                .iter()
                .format_with(" ", |(key, value), f| f(&format_args!("{key}='{value}'")))
        )
    }
}

impl SpiceLikeNetlister for Spice {
    fn write_prelude<W: Write>(&self, out: &mut W, options: &NetlistOptions) -> Result<()> {
        writeln!(out, "* {}", options.library_name)?;
        writeln!(out, "* Generated by the hdl netlister")?;
        writeln!(out, "* ")?;
        Ok(())
    }

    fn write_include<W: Write>(&self, out: &mut W, include: &Include) -> Result<()> {
        if let Some(section) = &include.section {
            write!(out, ".LIB {:?} {}", include.path, section)?;
        } else {
            write!(out, ".INCLUDE {:?}", include.path)?;
        }
        Ok(())
    }

    fn write_start_subckt<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        ports: &[ArcStr],
    ) -> Result<()> {
        writeln!(out, ".SUBCKT {name} ")?;
        if ports.is_empty() {
            writeln!(out, "+ * No ports")?;
        } else {
            writeln!(out, "+ {} ", ports.iter().join(" "))?;
        }
        writeln!(out, "+ * No parameters")?;
        writeln!(out)?;
        Ok(())
    }

    fn write_end_subckt<W: Write>(&self, out: &mut W, _name: &ArcStr) -> Result<()> {
        writeln!(out, ".ENDS")?;
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
        writeln!(out, "x{name} ")?;
        Self::write_connections(out, connections)?;
        writeln!(out, "+ {child} ")?;
        Self::write_params(out, params)?;
        writeln!(out)?;
        Ok(())
    }

    fn write_primitive_inst<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        connections: &[ArcStr],
        device: &DeviceRender,
    ) -> Result<()> {
        match device {
            DeviceRender::Subckt { name: subckt, params } => {
                self.write_instance(out, name, connections, subckt, params)
            }
            DeviceRender::Element {
                kind,
                model,
                params,
            } => {
                writeln!(out, "{}{name} ", kind.spice_prefix())?;
                Self::write_connections(out, connections)?;
                if let Some(model) = model {
                    writeln!(out, "+ {model} ")?;
                }
                Self::write_params(out, params)?;
                writeln!(out)?;
                Ok(())
            }
        }
    }
}
