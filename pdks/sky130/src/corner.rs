//! An enumeration of supported corners.

use std::path::Path;

use hdl::pdk::Include;
use serde::{Deserialize, Serialize};

/// An enumeration of supported corners.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sky130Corner {
    /// Typical.
    #[default]
    Tt,
    /// Slow-fast.
    Sf,
    /// Fast-slow.
    Fs,
    /// Fast-fast.
    Ff,
    /// Slow-slow.
    Ss,
}

impl Sky130Corner {
    /// Returns the name of the corner.
    pub fn name(&self) -> arcstr::ArcStr {
        match *self {
            Self::Tt => arcstr::literal!("tt"),
            Self::Fs => arcstr::literal!("fs"),
            Self::Sf => arcstr::literal!("sf"),
            Self::Ff => arcstr::literal!("ff"),
            Self::Ss => arcstr::literal!("ss"),
        }
    }

    /// The model library section for this corner, rooted at the open PDK directory.
    pub(crate) fn include(&self, open_root_dir: &Path) -> Include {
        Include::new(open_root_dir.join("libraries/sky130_fd_pr/latest/models/sky130.lib.spice"))
            .section(self.name())
    }
}
