//! IP claim scheduling and reconciliation
//!
//! This module implements the controller core: three loops sharing one
//! [`IpClaimScheduler`]. The loops never block each other; they coordinate
//! only through the API server and through the liveness state guarded
//! here. Each loop runs until the shared cancellation token fires or its
//! input stream ends.

mod claim;
mod liveness;
mod monitor;
mod service;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use liveness::Liveness;

use crate::store::{ClaimOps, NodeOps};
use crate::{Error, Result};

/// Shared state for the three reconciliation loops
///
/// One instance is created at startup and shared (via `Arc`) between the
/// service watcher, claim watcher, and node monitor tasks.
pub struct IpClaimScheduler {
    default_mask: String,
    claims: Arc<dyn ClaimOps>,
    nodes: Arc<dyn NodeOps>,
    liveness: Mutex<Liveness>,
}

impl IpClaimScheduler {
    /// Create a scheduler using `default_mask` for every derived CIDR
    ///
    /// The mask must be a netmask bit width in `0..=32`.
    pub fn new(
        default_mask: impl Into<String>,
        claims: Arc<dyn ClaimOps>,
        nodes: Arc<dyn NodeOps>,
    ) -> Result<Self> {
        let default_mask = default_mask.into();
        match default_mask.parse::<u8>() {
            Ok(bits) if bits <= 32 => {}
            _ => {
                return Err(Error::validation(format!(
                    "default mask '{default_mask}' is not a netmask bit width in 0..=32"
                )))
            }
        }

        Ok(Self {
            default_mask,
            claims,
            nodes,
            liveness: Mutex::new(Liveness::default()),
        })
    }

    /// Returns whether the node monitor currently classifies `name` as live
    pub fn is_live(&self, name: &str) -> bool {
        self.liveness().is_live(name)
    }

    /// Lock the liveness state, recovering from a poisoned lock
    ///
    /// The maps stay internally consistent across panics (single writer,
    /// whole-tick updates), so the poison flag carries no information.
    fn liveness(&self) -> MutexGuard<'_, Liveness> {
        self.liveness.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MockClaimOps, MockNodeOps};

    #[test]
    fn rejects_invalid_masks() {
        for mask in ["", "33", "256", "abc", "-1"] {
            let result = IpClaimScheduler::new(
                mask,
                Arc::new(MockClaimOps::new()),
                Arc::new(MockNodeOps::new()),
            );
            assert!(result.is_err(), "mask {mask:?} should be rejected");
        }
    }

    #[test]
    fn accepts_valid_masks() {
        for mask in ["0", "24", "32"] {
            let result = IpClaimScheduler::new(
                mask,
                Arc::new(MockClaimOps::new()),
                Arc::new(MockNodeOps::new()),
            );
            assert!(result.is_ok(), "mask {mask:?} should be accepted");
        }
    }

    #[test]
    fn unknown_node_is_not_live() {
        let scheduler = IpClaimScheduler::new(
            "24",
            Arc::new(MockClaimOps::new()),
            Arc::new(MockNodeOps::new()),
        )
        .unwrap();
        assert!(!scheduler.is_live("first"));
    }
}
