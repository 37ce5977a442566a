//! Elaboration of module hierarchies.
//!
//! Elaboration walks the instantiation graph depth-first, replacing every
//! generator call with its memoized module. Each module is closed after its
//! children: its arrays and interfaces are flattened, anonymous entities are
//! named, no-connects and port references become signals, and its
//! connectivity is validated.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};
use tracing::{event, span, Level};

use crate::error::{CyclePath, Error, Result};
use crate::generator::{GeneratorCall, Registry};
use crate::module::{Instantiable, Module};
use crate::validation;

pub(crate) mod flatten;
pub(crate) mod implicit;
pub(crate) mod naming;

/// Options controlling which elaboration passes run.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElabOptions {
    /// Validate the connectivity of every module.
    pub validate: bool,
    /// Replace interfaces with plain signals.
    pub flatten_interfaces: bool,
    /// Replace instance arrays with individual instances.
    pub flatten_arrays: bool,
}

impl Default for ElabOptions {
    fn default() -> Self {
        Self {
            validate: true,
            flatten_interfaces: true,
            flatten_arrays: true,
        }
    }
}

impl ElabOptions {
    /// Reads options from the `elab` table of `config`.
    ///
    /// Missing keys take their default values.
    pub fn from_config(config: &config::Config) -> anyhow::Result<Self> {
        Ok(config.get("elab")?.unwrap_or_default())
    }
}

/// The root of an elaboration.
#[derive(Clone, Debug)]
pub enum Elaboratable {
    /// A module.
    Module(Arc<Module>),
    /// A generator call.
    Generator(GeneratorCall),
}

impl From<Arc<Module>> for Elaboratable {
    fn from(value: Arc<Module>) -> Self {
        Self::Module(value)
    }
}

impl From<Module> for Elaboratable {
    fn from(value: Module) -> Self {
        Self::Module(Arc::new(value))
    }
}

impl From<GeneratorCall> for Elaboratable {
    fn from(value: GeneratorCall) -> Self {
        Self::Generator(value)
    }
}

/// Elaborates `root` with default options and a fresh registry.
pub fn elaborate(root: impl Into<Elaboratable>) -> Result<Arc<Module>> {
    let registry = Registry::new();
    Elaborator::new(&registry).elaborate(root)
}

/// The state of an elaboration run.
///
/// Modules are memoized by identity for the lifetime of the elaborator,
/// so a module shared by many instances is elaborated once and its
/// elaborated form is shared as well.
#[derive(Debug)]
pub struct Elaborator<'a> {
    registry: &'a Registry,
    options: ElabOptions,
    /// Maps input (and output) module addresses to `(input, output)`.
    ///
    /// The input is kept alive so that its address is not reused.
    done: HashMap<usize, (Arc<Module>, Arc<Module>)>,
    /// The modules on the current path, outermost first.
    active: Vec<(usize, ArcStr)>,
}

fn addr(module: &Arc<Module>) -> usize {
    Arc::as_ptr(module) as usize
}

impl<'a> Elaborator<'a> {
    /// Creates an elaborator that expands generators through `registry`.
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            options: ElabOptions::default(),
            done: HashMap::new(),
            active: Vec::new(),
        }
    }

    /// Sets the elaboration options.
    pub fn with_options(mut self, options: ElabOptions) -> Self {
        self.options = options;
        self
    }

    /// The registry used to expand generators.
    #[inline]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Elaborates `root` and everything it instantiates.
    ///
    /// Elaborating an already elaborated module returns the same module.
    pub fn elaborate(&mut self, root: impl Into<Elaboratable>) -> Result<Arc<Module>> {
        match root.into() {
            Elaboratable::Module(module) => self.module(&module),
            Elaboratable::Generator(call) => {
                let module = self.registry.expand(&call)?;
                self.module(&module)
            }
        }
    }

    fn module(&mut self, module: &Arc<Module>) -> Result<Arc<Module>> {
        let key = addr(module);
        if let Some((_, elaborated)) = self.done.get(&key) {
            return Ok(elaborated.clone());
        }
        if let Some(pos) = self.active.iter().position(|(k, _)| *k == key) {
            let mut names: Vec<ArcStr> = self.active[pos..]
                .iter()
                .map(|(_, name)| name.clone())
                .collect();
            names.push(module.name.clone());
            let path = CyclePath(names);
            event!(Level::ERROR, %path, "instantiation cycle detected");
            return Err(Error::Cycle(path));
        }
        if module.name.is_empty() {
            return Err(Error::Naming {
                module: arcstr::literal!("<anonymous>"),
                message: "modules must have a non-empty name".to_string(),
            });
        }

        let _guard = span!(Level::INFO, "elaborating module", name = %module.name).entered();
        self.active.push((key, module.name.clone()));
        let result = self.close(module);
        self.active.pop();
        let elaborated = result?;

        self.done.insert(key, (module.clone(), elaborated.clone()));
        self.done
            .insert(addr(&elaborated), (elaborated.clone(), elaborated.clone()));
        Ok(elaborated)
    }

    /// Elaborates the children of `module`, then runs the per-module passes.
    fn close(&mut self, module: &Arc<Module>) -> Result<Arc<Module>> {
        let mut out = Cow::Borrowed(module.as_ref());

        for (idx, inst) in module.instances.iter().enumerate() {
            let child = match &inst.of {
                Instantiable::Module(child) => child.clone(),
                Instantiable::Generator(call) => self.registry.expand(call)?,
                Instantiable::Primitive(_) | Instantiable::External(_) => continue,
            };
            let child = self.module(&child)?;
            let unchanged = matches!(&inst.of, Instantiable::Module(old) if Arc::ptr_eq(old, &child));
            if !unchanged {
                out.to_mut().instances[idx].of = Instantiable::Module(child);
            }
        }

        if self.options.flatten_arrays && flatten::has_arrays(&out) {
            flatten::arrays(out.to_mut());
        }
        if self.options.flatten_interfaces && flatten::has_interfaces(&out) {
            flatten::interfaces(out.to_mut());
        }
        if naming::needs_names(&out) {
            naming::assign(out.to_mut());
        }
        if implicit::has_implicit(&out) {
            let issues = implicit::resolve(out.to_mut());
            if issues.has_error() {
                return Err(Error::Connectivity {
                    module: module.name.clone(),
                    issues,
                });
            }
        }
        if self.options.validate {
            let warnings = validation::require_valid(&out)?;
            if !warnings.is_empty() {
                event!(
                    Level::DEBUG,
                    warnings = warnings.num_warnings(),
                    "module passed validation with warnings"
                );
            }
        }

        Ok(match out {
            Cow::Borrowed(_) => module.clone(),
            Cow::Owned(elaborated) => {
                event!(Level::DEBUG, "module rewritten during elaboration");
                Arc::new(elaborated)
            }
        })
    }
}
