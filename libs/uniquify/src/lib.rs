//! A library for assigning unique names.
//!
//! Names are allocated deterministically: the same sequence of requests
//! always yields the same sequence of names.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use arcstr::ArcStr;
use serde::{Deserialize, Serialize};

/// A set of unique names.
///
/// Each key of type `K` is assigned a unique name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Names<K: Hash + Eq> {
    names: HashSet<ArcStr>,
    assignments: HashMap<K, ArcStr>,
    /// The next index to try for each prefix passed to [`Names::assign_indexed`].
    counters: HashMap<ArcStr, usize>,
}

impl<K: Hash + Eq> Default for Names<K> {
    fn default() -> Self {
        Self {
            names: HashSet::new(),
            assignments: HashMap::new(),
            counters: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> Names<K> {
    /// Creates a new, empty name set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the name associated with this key, if it exists.
    pub fn name(&self, id: &K) -> Option<ArcStr> {
        self.assignments.get(id).cloned()
    }

    /// Returns `true` if `name` has been assigned or reserved.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Marks `name` as taken without associating it with a key.
    ///
    /// Returns `false` if the name was already taken.
    pub fn reserve(&mut self, name: impl Into<ArcStr>) -> bool {
        self.names.insert(name.into())
    }

    /// Allocates a new, unique name associated with the given ID.
    ///
    /// The name will be `base_name` if it is free,
    /// and `base_name_1`, `base_name_2`, etc. otherwise.
    pub fn assign_name(&mut self, id: K, base_name: &str) -> ArcStr {
        let name = if self.names.contains(base_name) {
            let mut i = 1;
            loop {
                let new_name = arcstr::format!("{}_{}", base_name, i);
                if !self.names.contains(&new_name) {
                    break new_name;
                }
                i += 1;
            }
        } else {
            base_name.into()
        };

        self.insert(id, name)
    }

    /// Allocates the name `prefix_k` for the smallest `k` not yet handed out
    /// for this prefix and not already taken.
    ///
    /// Successive calls with the same prefix yield increasing indices,
    /// so names follow the order in which they are requested.
    pub fn assign_indexed(&mut self, id: K, prefix: &str) -> ArcStr {
        let counter = self.counters.entry(ArcStr::from(prefix)).or_insert(0);
        let name = loop {
            let candidate = arcstr::format!("{}_{}", prefix, *counter);
            *counter += 1;
            if !self.names.contains(&candidate) {
                break candidate;
            }
        };

        self.insert(id, name)
    }

    fn insert(&mut self, id: K, name: ArcStr) -> ArcStr {
        self.names.insert(name.clone());
        self.assignments.insert(id, name.clone());
        name
    }
}
