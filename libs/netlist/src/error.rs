//! Netlisting errors.

use std::sync::Arc;

use arcstr::ArcStr;

/// A result type returning netlisting errors.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for netlisting.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] Arc<std::io::Error>),
    /// An error from elaboration or PDK mapping.
    #[error(transparent)]
    Hdl(#[from] hdl::Error),
    /// A port of an instance is not connected.
    #[error("port `{port}` of instance `{instance}` in module `{module}` is not connected")]
    UnconnectedPort {
        /// The enclosing module.
        module: ArcStr,
        /// The instance.
        instance: ArcStr,
        /// The unconnected port.
        port: ArcStr,
    },
    /// A module still contains interfaces or interface connections.
    #[error("module `{module}` contains interface `{interface}`; interfaces must be flattened before netlisting")]
    UnflattenedInterface {
        /// The module.
        module: ArcStr,
        /// The interface instance or port.
        interface: ArcStr,
    },
    /// A module still contains an instance array.
    #[error("instance array `{instance}` in module `{module}` must be flattened before netlisting")]
    UnflattenedArray {
        /// The module.
        module: ArcStr,
        /// The array.
        instance: ArcStr,
    },
    /// A signal or instance has no name.
    #[error("module `{module}` contains an unnamed {kind}; elaborate it before netlisting")]
    Unnamed {
        /// The module.
        module: ArcStr,
        /// What kind of entity is unnamed.
        kind: &'static str,
    },
    /// A connection cannot be resolved to signals of the enclosing module.
    #[error("invalid connection to port `{port}` of instance `{instance}` in module `{module}`")]
    InvalidConnection {
        /// The module.
        module: ArcStr,
        /// The instance.
        instance: ArcStr,
        /// The port.
        port: ArcStr,
    },
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Arc::new(value))
    }
}
