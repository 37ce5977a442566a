//! Issues found while checking circuits, and their severities.
//!
//! Checks accumulate every issue they find into an [`IssueSet`] instead of
//! stopping at the first. Callers then decide whether the set is fatal.

#![warn(missing_docs)]

#[cfg(test)]
pub(crate) mod tests;

use std::fmt::{Debug, Display};

use serde::{Deserialize, Serialize};

/// An issue found by a check.
pub trait Diagnostic: Debug + Display {
    /// The severity of this issue.
    ///
    /// Defaults to [`Severity::Warning`].
    fn severity(&self) -> Severity {
        Severity::default()
    }
}

/// How serious an issue is.
///
/// Severities are ordered from least to most severe.
#[derive(
    Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reported for information only.
    Info,
    /// Suspicious, but does not fail a check.
    #[default]
    Warning,
    /// Fails the check that produced it.
    Error,
}

impl Severity {
    const ALL: [Severity; 3] = [Severity::Info, Severity::Warning, Severity::Error];

    fn index(self) -> usize {
        self as usize
    }

    /// The log level at which issues of this severity are reported.
    #[inline]
    pub const fn as_tracing_level(&self) -> tracing::Level {
        match *self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Returns `true` for [`Severity::Error`].
    #[inline]
    pub fn is_error(&self) -> bool {
        *self == Self::Error
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Issues in the order they were found, with per-severity tallies.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    counts: [usize; 3],
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self {
            issues: Vec::new(),
            counts: [0; 3],
        }
    }
}

impl<T> IssueSet<T> {
    /// An empty set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates over issues in the order they were added.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.issues.iter()
    }

    /// The total number of issues.
    #[inline]
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Returns `true` if no issues were found.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// The number of issues of the given severity.
    #[inline]
    pub fn count(&self, severity: Severity) -> usize {
        self.counts[severity.index()]
    }

    /// The number of errors.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.count(Severity::Error)
    }

    /// The number of warnings.
    #[inline]
    pub fn num_warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Returns `true` if any issue is an error.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.num_errors() > 0
    }

    /// Returns `true` if any issue is a warning.
    #[inline]
    pub fn has_warning(&self) -> bool {
        self.num_warnings() > 0
    }

    /// The most severe level present, or `None` for an empty set.
    pub fn worst(&self) -> Option<Severity> {
        Severity::ALL
            .into_iter()
            .rev()
            .find(|severity| self.count(*severity) > 0)
    }

    /// Fails with the whole set if it contains an error.
    ///
    /// Non-fatal issues are kept on success.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.has_error() {
            Err(self)
        } else {
            Ok(self)
        }
    }
}

impl<T: Diagnostic> IssueSet<T> {
    /// Records an issue.
    pub fn add(&mut self, issue: T) {
        self.counts[issue.severity().index()] += 1;
        self.issues.push(issue);
    }

    /// Iterates over the issues of severity [`Severity::Error`].
    pub fn errors(&self) -> impl Iterator<Item = &T> {
        self.issues.iter().filter(|issue| issue.severity().is_error())
    }
}

impl<T: Diagnostic> Extend<T> for IssueSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        iter.into_iter().for_each(|issue| self.add(issue));
    }
}

impl<T: Diagnostic> FromIterator<T> for IssueSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a IssueSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}

/// One issue per line.
impl<T: Display> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.issues
            .iter()
            .try_for_each(|issue| writeln!(f, "{issue}"))
    }
}
