//! Deterministic names for anonymous signals and instances.

use tracing::{event, Level};
use uniquify::Names;

use crate::module::Module;

/// Returns `true` if `module` has an anonymous signal or instance.
pub(crate) fn needs_names(module: &Module) -> bool {
    module.signals.iter().any(|s| s.name.is_none())
        || module.instances.iter().any(|i| i.name.is_none())
}

/// Names anonymous signals `sig_<k>` and anonymous instances `inst_<k>`.
///
/// Indices count anonymous entities in declaration order. Indices whose name
/// is already used by a named entity are skipped. Signals and instances
/// are named independently.
pub(crate) fn assign(module: &mut Module) {
    let mut signals = Names::new();
    for name in module.signals.iter().filter_map(|s| s.name.clone()) {
        signals.reserve(name);
    }
    for (idx, signal) in module.signals.iter_mut().enumerate() {
        if signal.name.is_none() {
            let name = signals.assign_indexed(idx, "sig");
            event!(Level::TRACE, module = %module.name, %name, "named anonymous signal");
            signal.name = Some(name);
        }
    }

    let mut instances = Names::new();
    for name in module.instances.iter().filter_map(|i| i.name.clone()) {
        instances.reserve(name);
    }
    for (idx, inst) in module.instances.iter_mut().enumerate() {
        if inst.name.is_none() {
            let name = instances.assign_indexed(idx, "inst");
            event!(Level::TRACE, module = %module.name, %name, "named anonymous instance");
            inst.name = Some(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::module::Instance;
    use crate::primitives::PrimitiveCall;
    use crate::signal::Signal;

    #[test]
    fn anonymous_entities_get_sequential_names() {
        let mut m = Module::new("m");
        m.add_signal(Signal::anonymous(1));
        m.add_signal(Signal::new("sig_1", 1));
        m.add_signal(Signal::anonymous(2));
        m.add_signal(Signal::anonymous(1));
        m.add_instance(Instance::anonymous(PrimitiveCall::Short));
        m.add_instance(Instance::new("inst_0", PrimitiveCall::Short));
        m.add_instance(Instance::anonymous(PrimitiveCall::Short));

        assert!(needs_names(&m));
        assign(&mut m);
        assert!(!needs_names(&m));

        let signals: Vec<_> = m.signals().map(|(_, s)| s.name().unwrap().clone()).collect();
        assert_eq!(signals, vec!["sig_0", "sig_1", "sig_2", "sig_3"]);
        let instances: Vec<_> = m.instances().iter().map(|i| i.name().unwrap().clone()).collect();
        assert_eq!(instances, vec!["inst_1", "inst_0", "inst_2"]);
    }
}
