//! Rendered parameter values.

use std::fmt::Display;

use arcstr::ArcStr;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A parameter value as it appears in a netlist.
///
/// Numeric values are unit-less magnitudes; any scaling
/// has already been applied by the producer of the value.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// A decimal number.
    ///
    /// Rendered without trailing zeros and without an exponent.
    Decimal(Decimal),
    /// An integer.
    Int(i64),
    /// A string.
    Str(ArcStr),
    /// An expression, rendered verbatim.
    Literal(ArcStr),
}

impl ParamValue {
    /// Creates a [`ParamValue::Literal`].
    pub fn literal(expr: impl Into<ArcStr>) -> Self {
        Self::Literal(expr.into())
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decimal(value) => write!(f, "{}", value.normalize()),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) | Self::Literal(value) => write!(f, "{value}"),
        }
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Decimal(Decimal::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<ArcStr> for ParamValue {
    fn from(value: ArcStr) -> Self {
        Self::Str(value)
    }
}
