//! Built-in generators for tiling devices in series and in parallel.

use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use arcstr::ArcStr;
use lazy_static::lazy_static;

use crate::generator::Generator;
use crate::module::{Instance, Instantiable, Module, PortInfo};
use crate::primitives::{MosParams, PrimitiveCall};
use crate::signal::{PortDir, Signal};

/// Parameters of [`SERIES_PAR`].
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SeriesParParams {
    /// The module to tile.
    pub unit: Arc<Module>,
    /// The number of parallel rows.
    pub npar: usize,
    /// The number of units in series within each row.
    pub nser: usize,
    /// The ports chained in series: `series_conns[1]` of each unit
    /// connects to `series_conns[0]` of the next unit in its row.
    pub series_conns: [ArcStr; 2],
}

lazy_static! {
    /// Tiles a unit module into `npar` parallel rows of `nser` units in series.
    ///
    /// Units are named `unit_<row>_<col>`. All ports other than the series ports
    /// are connected in parallel to the outer port of the same name.
    pub static ref SERIES_PAR: Generator<SeriesParParams> = Generator::new("SeriesPar", series_par);

    /// Stacks `nser` MOS devices in series, source to drain.
    ///
    /// Each device has the given parameters with `nser` set to 1.
    pub static ref MOS_SERIES: Generator<MosParams> = Generator::new("MosSeries", mos_series);
}

fn series_par(params: &SeriesParParams) -> anyhow::Result<Module> {
    let ports = params.unit.port_info();
    let mut module = Module::new(arcstr::format!(
        "{}_series_par_{}x{}",
        params.unit.name(),
        params.npar,
        params.nser
    ));
    for port in ports.iter() {
        if port.interface.is_some() {
            bail!(
                "cannot tile module `{}`: port `{}` is an interface",
                params.unit.name(),
                port.name
            );
        }
        module.add_signal(Signal::port(port.name.clone(), port.width, port.direction));
    }

    chain(
        &mut module,
        &Instantiable::Module(params.unit.clone()),
        &ports,
        &params.series_conns,
        params.npar,
        params.nser,
        |row, col| arcstr::format!("unit_{row}_{col}"),
    )?;
    Ok(module)
}

fn mos_series(params: &MosParams) -> anyhow::Result<Module> {
    let mut module = Module::new("MosSeries");
    for port in ["d", "g", "s", "b"] {
        module.add_port(port, 1, PortDir::Inout);
    }

    let unit = PrimitiveCall::Mos(MosParams {
        nser: 1,
        ..params.clone()
    });
    let target = Instantiable::Primitive(unit);
    let ports = target
        .ports()
        .context("primitive targets always have ports")?;
    let nser = usize::try_from(params.nser).context("nser is too large")?;

    chain(
        &mut module,
        &target,
        &ports,
        &[arcstr::literal!("s"), arcstr::literal!("d")],
        1,
        nser,
        |_, col| arcstr::format!("unit{col}"),
    )?;
    Ok(module)
}

/// Places `rows * cols` instances of `target` in `module`.
///
/// `module` must already declare a port for every port of `target`.
fn chain(
    module: &mut Module,
    target: &Instantiable,
    ports: &[PortInfo],
    series: &[ArcStr; 2],
    rows: usize,
    cols: usize,
    name: impl Fn(usize, usize) -> ArcStr,
) -> anyhow::Result<()> {
    ensure!(rows > 0 && cols > 0, "cannot tile {rows}x{cols} units");
    ensure!(
        series[0] != series[1],
        "series ports must be distinct, but both are `{}`",
        series[0]
    );
    let width = |port: &ArcStr| {
        ports
            .iter()
            .find(|p| &p.name == port)
            .map(|p| p.width)
            .with_context(|| format!("`{}` has no series port `{port}`", target.name()))
    };
    let series_width = width(&series[1])?;
    ensure!(
        width(&series[0])? == series_width,
        "series ports `{}` and `{}` have different widths",
        series[0],
        series[1]
    );

    let outer = ports
        .iter()
        .map(|port| {
            module
                .signal_named(&port.name)
                .with_context(|| format!("missing outer port `{}`", port.name))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    for row in 0..rows {
        let mut prev = None;
        for col in 0..cols {
            let inst_name = name(row, col);
            let next = if col + 1 < cols {
                Some(module.add_signal(Signal::new(
                    arcstr::format!("{inst_name}_{}", series[1]),
                    series_width,
                )))
            } else {
                None
            };

            let mut inst = Instance::new(inst_name, target.clone());
            for (port, outer) in ports.iter().zip(outer.iter()) {
                let signal = if port.name == series[0] {
                    prev.unwrap_or(*outer)
                } else if port.name == series[1] {
                    next.unwrap_or(*outer)
                } else {
                    *outer
                };
                inst = inst.connect(port.name.clone(), signal);
            }
            module.add_instance(inst);
            prev = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use test_log::test;

    use super::*;
    use crate::elab::elaborate;
    use crate::module::Connectable;

    fn unit() -> Arc<Module> {
        let mut m = Module::new("unit");
        for port in ["a", "b", "c", "d", "e", "f", "g"] {
            m.add_port(port, 1, PortDir::Inout);
        }
        m.add_instance(
            Instance::new("r", PrimitiveCall::IdealResistor(dec!(100)))
                .connect("p", m.signal_named("a").unwrap())
                .connect("n", m.signal_named("b").unwrap()),
        );
        Arc::new(m)
    }

    #[test]
    fn series_par_tiles_units() {
        let top = elaborate(SERIES_PAR.call(SeriesParParams {
            unit: unit(),
            npar: 2,
            nser: 2,
            series_conns: [arcstr::literal!("a"), arcstr::literal!("b")],
        }))
        .unwrap();

        let names: Vec<_> = top.instances().iter().map(|i| i.name().unwrap().as_str()).collect();
        assert_eq!(names, vec!["unit_0_0", "unit_0_1", "unit_1_0", "unit_1_1"]);
        let internal: Vec<_> = top
            .internal_signals()
            .map(|(_, s)| s.name().unwrap().as_str())
            .collect();
        assert_eq!(internal, vec!["unit_0_0_b", "unit_1_0_b"]);

        let a = top.signal_named("a").unwrap();
        let b = top.signal_named("b").unwrap();
        let mid = top.signal_named("unit_0_0_b").unwrap();
        let first = top.instance_named("unit_0_0").unwrap();
        let second = top.instance_named("unit_0_1").unwrap();
        assert_eq!(first.connection("a"), Some(&Connectable::Signal(a)));
        assert_eq!(first.connection("b"), Some(&Connectable::Signal(mid)));
        assert_eq!(second.connection("a"), Some(&Connectable::Signal(mid)));
        assert_eq!(second.connection("b"), Some(&Connectable::Signal(b)));
        assert_eq!(
            second.connection("g"),
            Some(&Connectable::Signal(top.signal_named("g").unwrap()))
        );
    }

    #[test]
    fn series_par_rejects_bad_params() {
        let params = SeriesParParams {
            unit: unit(),
            npar: 0,
            nser: 2,
            series_conns: [arcstr::literal!("a"), arcstr::literal!("b")],
        };
        assert!(elaborate(SERIES_PAR.call(params.clone())).is_err());
        assert!(elaborate(SERIES_PAR.call(SeriesParParams {
            npar: 1,
            series_conns: [arcstr::literal!("a"), arcstr::literal!("zz")],
            ..params
        }))
        .is_err());
    }

    #[test]
    fn mos_series_chains_source_to_drain() {
        let params = MosParams::builder()
            .w(dec!(0.000001))
            .l(dec!(0.00000015))
            .nser(3)
            .build()
            .unwrap();
        let top = elaborate(MOS_SERIES.call(params)).unwrap();

        assert_eq!(top.name(), "MosSeries");
        assert_eq!(top.instances().len(), 3);
        let d = top.signal_named("d").unwrap();
        let s = top.signal_named("s").unwrap();
        let mid0 = top.signal_named("unit0_d").unwrap();
        let mid1 = top.signal_named("unit1_d").unwrap();

        let unit0 = top.instance_named("unit0").unwrap();
        let unit1 = top.instance_named("unit1").unwrap();
        let unit2 = top.instance_named("unit2").unwrap();
        assert_eq!(unit0.connection("s"), Some(&Connectable::Signal(s)));
        assert_eq!(unit0.connection("d"), Some(&Connectable::Signal(mid0)));
        assert_eq!(unit1.connection("s"), Some(&Connectable::Signal(mid0)));
        assert_eq!(unit1.connection("d"), Some(&Connectable::Signal(mid1)));
        assert_eq!(unit2.connection("d"), Some(&Connectable::Signal(d)));

        match unit1.of() {
            Instantiable::Primitive(PrimitiveCall::Mos(params)) => assert_eq!(params.nser, 1),
            other => panic!("unexpected target: {other:?}"),
        }
    }
}
