//! Error types and error handling utilities.

use std::fmt::Display;
use std::sync::Arc;

use arcstr::ArcStr;
use diagnostics::IssueSet;

use crate::validation::ConnectivityError;

/// A result type returning elaboration errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for elaboration and PDK mapping.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// A generator build function failed, panicked, or returned something other than a module.
    #[error("error expanding generator `{generator}` with params {params}: {cause:#}")]
    GeneratorExpansion {
        /// The generator name.
        generator: ArcStr,
        /// The debug rendering of the parameter value.
        params: String,
        /// The underlying failure.
        cause: Arc<anyhow::Error>,
    },
    /// A module instantiates itself, directly or transitively.
    #[error("instantiation cycle: {0}")]
    Cycle(CyclePath),
    /// A module failed connectivity validation.
    #[error("module `{module}` failed connectivity validation:\n{issues}")]
    Connectivity {
        /// The name of the invalid module.
        module: ArcStr,
        /// The issues found. Contains at least one error.
        issues: IssueSet<ConnectivityError>,
    },
    /// The PDK mapping has no device for a primitive and parameter value.
    #[error("PDK `{pdk}` does not support primitive `{primitive}` with params {params}")]
    UnsupportedDeviceVariant {
        /// The PDK name.
        pdk: ArcStr,
        /// The primitive name.
        primitive: ArcStr,
        /// A rendering of the parameter value.
        params: String,
    },
    /// The PDK supports the device, but the parameter values are not legal.
    #[error("invalid parameters for primitive `{primitive}` in PDK `{pdk}`: {message}")]
    InvalidDeviceParams {
        /// The PDK name.
        pdk: ArcStr,
        /// The primitive name.
        primitive: ArcStr,
        /// What is wrong with the parameters.
        message: String,
    },
    /// A generator call was found where only resolved targets are allowed.
    #[error("instance `{instance}` of module `{module}` refers to unexpanded generator `{generator}`")]
    UnresolvedGenerator {
        /// The enclosing module.
        module: ArcStr,
        /// The instance name.
        instance: ArcStr,
        /// The generator name.
        generator: ArcStr,
    },
    /// A name could not be derived.
    #[error("naming error in module `{module}`: {message}")]
    Naming {
        /// The enclosing module.
        module: ArcStr,
        /// What went wrong.
        message: String,
    },
}

impl Error {
    pub(crate) fn expansion(
        generator: impl Into<ArcStr>,
        params: impl Into<String>,
        cause: anyhow::Error,
    ) -> Self {
        Self::GeneratorExpansion {
            generator: generator.into(),
            params: params.into(),
            cause: Arc::new(cause),
        }
    }
}

/// The ordered list of module and generator names participating in a cycle.
///
/// The first and last names are equal.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CyclePath(pub(crate) Vec<ArcStr>);

impl CyclePath {
    /// The names along the cycle.
    #[inline]
    pub fn names(&self) -> &[ArcStr] {
        &self.0
    }
}

impl Display for CyclePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", itertools::join(&self.0, " -> "))
    }
}
