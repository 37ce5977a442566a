//! SPICE-like netlisting of elaborated circuit hierarchies.
//!
//! Netlisting walks an elaborated module graph, emitting each distinct
//! module once as a subcircuit definition, children before parents.
//! Primitive devices are rendered through a [`PdkMapping`].
#![warn(missing_docs)]

use std::collections::HashSet;
use std::io::Write;
use std::sync::Arc;

use arcstr::ArcStr;
use hdl::pdk::{DeviceRender, Include, PdkMapping};
use hdl::{Connectable, Instance, Instantiable, Module, ParamValue, SignalId};
use serde::{Deserialize, Serialize};
use tracing::{event, span, Level};
use uniquify::Names;

pub mod error;
pub mod spectre;
pub mod spice;

pub use error::{Error, Result};
pub use spectre::Spectre;
pub use spice::Spice;

/// Supported netlist formats.
#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// SPICE (ngspice/Xyce compatible).
    #[default]
    Spice,
    /// Spectre.
    Spectre,
}

/// Configuration for netlisting.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetlistOptions {
    /// The netlist format.
    pub format: Format,
    /// The library name written in the netlist header.
    pub library_name: String,
    /// Whether to write a header before the include statements.
    pub header: bool,
}

impl Default for NetlistOptions {
    fn default() -> Self {
        Self {
            format: Format::default(),
            library_name: "hdl".to_string(),
            header: true,
        }
    }
}

impl NetlistOptions {
    /// Reads options from the `netlist` table of `config`.
    ///
    /// Missing keys take their default values.
    pub fn from_config(config: &config::Config) -> anyhow::Result<Self> {
        Ok(config.get("netlist")?.unwrap_or_default())
    }
}

/// A netlist format with a SPICE-like structure.
pub trait SpiceLikeNetlister {
    /// Writes a header to the beginning of the output stream.
    ///
    /// Should include a newline after if needed.
    fn write_prelude<W: Write>(&self, out: &mut W, options: &NetlistOptions) -> std::io::Result<()>;
    /// Writes an include statement.
    ///
    /// A newline will be added afterward.
    fn write_include<W: Write>(&self, out: &mut W, include: &Include) -> std::io::Result<()>;
    /// Writes a begin subcircuit statement, given the port bit names in order.
    fn write_start_subckt<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        ports: &[ArcStr],
    ) -> std::io::Result<()>;
    /// Writes an end subcircuit statement.
    fn write_end_subckt<W: Write>(&self, out: &mut W, name: &ArcStr) -> std::io::Result<()>;
    /// Writes an instance of a subcircuit.
    fn write_instance<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        connections: &[ArcStr],
        child: &ArcStr,
        params: &[(ArcStr, ParamValue)],
    ) -> std::io::Result<()>;
    /// Writes an instance of a primitive device.
    fn write_primitive_inst<W: Write>(
        &self,
        out: &mut W,
        name: &ArcStr,
        connections: &[ArcStr],
        device: &DeviceRender,
    ) -> std::io::Result<()>;
    /// The preferred netlist name of bit `idx` of a signal named `signal`.
    ///
    /// A bus bit whose preferred name is taken by another net of the same
    /// module is renamed with a numeric suffix.
    fn bit_name(&self, signal: &ArcStr, width: usize, idx: usize) -> ArcStr {
        if width == 1 {
            signal.clone()
        } else {
            arcstr::format!("{signal}_{idx}")
        }
    }
    /// Writes a postlude to the end of the output stream.
    #[allow(unused_variables)]
    fn write_postlude<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        Ok(())
    }
}

/// Netlists `module` and everything it instantiates, returning the netlist text.
///
/// `module` must be elaborated.
pub fn emit(module: &Arc<Module>, format: Format, pdk: &dyn PdkMapping) -> Result<String> {
    emit_with_options(
        module,
        pdk,
        &NetlistOptions {
            format,
            ..Default::default()
        },
    )
}

/// Netlists `module` with the given options, returning the netlist text.
pub fn emit_with_options(
    module: &Arc<Module>,
    pdk: &dyn PdkMapping,
    options: &NetlistOptions,
) -> Result<String> {
    let mut buf = Vec::new();
    write(module, pdk, options, &mut buf)?;
    String::from_utf8(buf)
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err).into())
}

/// Netlists `module` with the given options to `out`.
pub fn write<W: Write>(
    module: &Arc<Module>,
    pdk: &dyn PdkMapping,
    options: &NetlistOptions,
    out: &mut W,
) -> Result<()> {
    match options.format {
        Format::Spice => NetlisterInstance::new(&Spice, pdk, options, out).export(module),
        Format::Spectre => NetlisterInstance::new(&Spectre, pdk, options, out).export(module),
    }
}

fn addr(module: &Arc<Module>) -> usize {
    Arc::as_ptr(module) as usize
}

/// Net names of one module, keyed by signal and bit.
type NetNames = Names<(SignalId, usize)>;

/// An instance of a netlister.
pub struct NetlisterInstance<'a, N, W> {
    netlister: &'a N,
    pdk: &'a dyn PdkMapping,
    options: &'a NetlistOptions,
    out: &'a mut W,
    names: Names<usize>,
}

impl<'a, N, W> NetlisterInstance<'a, N, W> {
    /// Creates a new [`NetlisterInstance`].
    pub fn new(
        netlister: &'a N,
        pdk: &'a dyn PdkMapping,
        options: &'a NetlistOptions,
        out: &'a mut W,
    ) -> Self {
        Self {
            netlister,
            pdk,
            options,
            out,
            names: Names::new(),
        }
    }
}

impl<N: SpiceLikeNetlister, W: Write> NetlisterInstance<'_, N, W> {
    /// Exports `root` and its dependencies to the output stream.
    pub fn export(mut self, root: &Arc<Module>) -> Result<()> {
        let _guard = span!(Level::INFO, "netlisting", top = %root.name(), pdk = %self.pdk.name())
            .entered();

        let mut order = Vec::new();
        let mut externals = Vec::new();
        collect(root, &mut HashSet::new(), &mut order, &mut externals)?;
        for name in externals {
            self.names.reserve(name);
        }
        for module in order.iter() {
            let name = self.names.assign_name(addr(module), module.name());
            if &name != module.name() {
                event!(Level::DEBUG, original = %module.name(), %name, "renamed module to avoid a collision");
            }
        }

        if self.options.header {
            self.netlister.write_prelude(self.out, self.options)?;
        }
        for include in self.pdk.includes() {
            self.netlister.write_include(self.out, &include)?;
            writeln!(self.out)?;
        }
        writeln!(self.out)?;

        for module in order.iter() {
            self.export_module(module)?;
        }

        self.netlister.write_postlude(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    fn module_name(&self, module: &Arc<Module>) -> ArcStr {
        self.names
            .name(&addr(module))
            .unwrap_or_else(|| module.name().clone())
    }

    fn export_module(&mut self, module: &Arc<Module>) -> Result<()> {
        let name = self.module_name(module);
        event!(Level::DEBUG, module = %name, "writing subcircuit");

        if let Some(iface) = module.interfaces().first() {
            return Err(Error::UnflattenedInterface {
                module: module.name().clone(),
                interface: iface.name().clone(),
            });
        }

        let nets = self.net_names(module)?;
        let mut ports = Vec::new();
        for (id, signal) in module.ports() {
            for idx in (0..signal.width()).rev() {
                ports.push(net_name(module, &nets, id, idx)?);
            }
        }

        self.netlister.write_start_subckt(self.out, &name, &ports)?;
        for inst in module.instances() {
            self.export_instance(module, &nets, inst)?;
        }
        self.netlister.write_end_subckt(self.out, &name)?;
        Ok(())
    }

    /// Names every bit of every signal in `module`.
    ///
    /// Single-bit signals keep their names. Bus bits are named afterward,
    /// so a bus bit never takes the name of a single-bit signal.
    fn net_names(&self, module: &Module) -> Result<NetNames> {
        let mut nets = Names::new();
        let unnamed = || Error::Unnamed {
            module: module.name().clone(),
            kind: "signal",
        };
        for (id, signal) in module.signals().filter(|(_, s)| s.width() == 1) {
            let name = signal.name().ok_or_else(unnamed)?;
            nets.assign_name((id, 0), name);
        }
        for (id, signal) in module.signals().filter(|(_, s)| s.width() > 1) {
            let name = signal.name().ok_or_else(unnamed)?;
            for idx in 0..signal.width() {
                let preferred = self.netlister.bit_name(name, signal.width(), idx);
                let net = nets.assign_name((id, idx), &preferred);
                if net != preferred {
                    event!(Level::DEBUG, module = %module.name(), %preferred, %net, "renamed bus bit to avoid a collision");
                }
            }
        }
        Ok(nets)
    }

    fn export_instance(
        &mut self,
        module: &Arc<Module>,
        nets: &NetNames,
        inst: &Instance,
    ) -> Result<()> {
        let name = inst.name().ok_or_else(|| Error::Unnamed {
            module: module.name().clone(),
            kind: "instance",
        })?;
        if inst.array_len().is_some() {
            return Err(Error::UnflattenedArray {
                module: module.name().clone(),
                instance: name.clone(),
            });
        }
        let ports = inst.of().ports().ok_or_else(|| hdl::Error::UnresolvedGenerator {
            module: module.name().clone(),
            instance: name.clone(),
            generator: inst.of().name(),
        })?;

        let mut connections = Vec::new();
        for port in ports {
            let conn = inst
                .connection(&port.name)
                .ok_or_else(|| Error::UnconnectedPort {
                    module: module.name().clone(),
                    instance: name.clone(),
                    port: port.name.clone(),
                })?;
            if port.interface.is_some() || matches!(conn, Connectable::Interface(_)) {
                return Err(Error::UnflattenedInterface {
                    module: module.name().clone(),
                    interface: port.name.clone(),
                });
            }
            let bits = conn.bits(module).ok_or_else(|| Error::InvalidConnection {
                module: module.name().clone(),
                instance: name.clone(),
                port: port.name.clone(),
            })?;
            for (signal, idx) in bits.into_iter().rev() {
                connections.push(net_name(module, nets, signal, idx)?);
            }
        }

        match inst.of() {
            Instantiable::Module(child) => {
                let child = self.module_name(child);
                self.netlister
                    .write_instance(self.out, name, &connections, &child, &[])?;
            }
            Instantiable::Primitive(call) => {
                let device = self.pdk.map(call)?;
                self.netlister
                    .write_primitive_inst(self.out, name, &connections, &device)?;
            }
            Instantiable::External(call) => {
                self.netlister.write_instance(
                    self.out,
                    name,
                    &connections,
                    call.module().name(),
                    call.params(),
                )?;
            }
            // Unreachable: generator targets have no ports.
            Instantiable::Generator(_) => (),
        }
        Ok(())
    }
}

fn net_name(module: &Module, nets: &NetNames, signal: SignalId, idx: usize) -> Result<ArcStr> {
    nets.name(&(signal, idx)).ok_or_else(|| Error::Unnamed {
        module: module.name().clone(),
        kind: "signal",
    })
}

/// Collects the modules reachable from `module` in post-order,
/// along with the names of all external modules they instantiate.
fn collect(
    module: &Arc<Module>,
    seen: &mut HashSet<usize>,
    order: &mut Vec<Arc<Module>>,
    externals: &mut Vec<ArcStr>,
) -> Result<()> {
    if !seen.insert(addr(module)) {
        return Ok(());
    }
    for inst in module.instances() {
        match inst.of() {
            Instantiable::Module(child) => collect(child, seen, order, externals)?,
            Instantiable::External(call) => externals.push(call.module().name().clone()),
            Instantiable::Generator(call) => {
                return Err(hdl::Error::UnresolvedGenerator {
                    module: module.name().clone(),
                    instance: inst
                        .name()
                        .cloned()
                        .unwrap_or_else(|| arcstr::literal!("<anonymous>")),
                    generator: call.generator_name().clone(),
                }
                .into())
            }
            Instantiable::Primitive(_) => (),
        }
    }
    order.push(module.clone());
    Ok(())
}
