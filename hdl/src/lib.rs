//! Elaboration of parameterized circuit hierarchies.
//!
//! Circuits are built from [`Module`]s, primitive devices, and [`Generator`]s.
//! [`elaborate`] resolves a root module or generator call into a closed graph
//! in which every generator call has been replaced by its memoized module,
//! and every module has been flattened, named, and validated.
#![warn(missing_docs)]

pub mod elab;
pub mod error;
pub mod generator;
pub mod generators;
pub mod interface;
pub mod module;
pub mod params;
pub mod pdk;
pub mod primitives;
pub mod signal;
pub mod validation;


pub use elab::{elaborate, ElabOptions, Elaboratable, Elaborator};
pub use error::{Error, Result};
pub use generator::{Generator, GeneratorCall, Registry};
pub use interface::{Interface, InterfaceInstance};
pub use module::{Connectable, ExternalModule, Instance, Instantiable, Module};
pub use params::ParamValue;
pub use primitives::PrimitiveCall;
pub use signal::{PortDir, Signal, SignalId};
pub use validation::validate;

#[doc(hidden)]
pub use arcstr;
