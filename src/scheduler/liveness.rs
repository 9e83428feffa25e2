//! Generation-based node liveness state
//!
//! A node is live iff its generation counter advanced between two
//! consecutive monitor sweeps. This is a two-sample comparison, not a true
//! failure detector: a node whose heartbeat agent reports the same
//! generation twice in a row is classified dead even if the process is
//! healthy. The heartbeat contract therefore requires a bump on every
//! report.

use std::collections::{HashMap, HashSet};

use crate::crd::IpNode;
use kube::ResourceExt;

/// Per-node liveness classification owned by the node monitor
///
/// Written only during monitor sweeps; read concurrently through the
/// scheduler's mutex by `is_live` queries and node selection.
#[derive(Default)]
pub(crate) struct Liveness {
    live: HashSet<String>,
    observed_generation: HashMap<String, i64>,
}

impl Liveness {
    /// Fold one listing into the state, returning nodes that died this sweep
    ///
    /// First sight of a node classifies it live (not yet proven to
    /// heartbeat, but not penalized either). A node absent from the
    /// listing keeps its previous classification. A node already dead is
    /// not reported again.
    pub(crate) fn observe(&mut self, nodes: &[IpNode]) -> Vec<String> {
        let mut newly_dead = Vec::new();

        for node in nodes {
            let name = node.name_any();
            let generation = node.generation();

            match self.observed_generation.insert(name.clone(), generation) {
                Some(previous) if previous == generation => {
                    if self.live.remove(&name) {
                        newly_dead.push(name);
                    }
                }
                _ => {
                    self.live.insert(name);
                }
            }
        }

        newly_dead
    }

    /// Returns whether `name` is in the live set
    pub(crate) fn is_live(&self, name: &str) -> bool {
        self.live.contains(name)
    }

    /// Returns whether `name` has been observed and classified dead
    ///
    /// Nodes never seen by the monitor are neither live nor dead; the
    /// claim watcher treats them as eligible candidates.
    pub(crate) fn is_dead(&self, name: &str) -> bool {
        self.observed_generation.contains_key(name) && !self.live.contains(name)
    }
}
