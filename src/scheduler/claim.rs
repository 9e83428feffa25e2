//! Claim watcher loop
//!
//! Assigns unassigned IpClaims to nodes. Because the watch stream folds
//! creations and updates into a single applied event, a claim cleared by
//! the node monitor re-enters this loop on its next delivered event and is
//! re-scheduled without any extra queueing.

use futures::{Stream, StreamExt};
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::IpClaimScheduler;
use crate::crd::{IpClaim, IpNode, NODE_LABEL};
use crate::store::WatchEvent;

impl IpClaimScheduler {
    /// Run the claim watcher until cancellation or stream end
    pub async fn claim_watcher<S>(&self, mut events: S, stop: CancellationToken)
    where
        S: Stream<Item = WatchEvent<IpClaim>> + Unpin,
    {
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    debug!("claim watcher stopping");
                    break;
                }
                event = events.next() => {
                    match event {
                        Some(WatchEvent::Applied(claim)) if !claim.is_assigned() => {
                            self.schedule_claim(claim).await;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
        }
    }

    /// Pick a node for an unassigned claim and write the assignment
    async fn schedule_claim(&self, mut claim: IpClaim) {
        let name = claim.name_any();

        let nodes = match self.nodes.list().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(claim = %name, error = %e, "failed to list nodes");
                return;
            }
        };

        let Some(node) = self.select_node(&nodes) else {
            debug!(claim = %name, "no schedulable nodes, claim stays unassigned");
            return;
        };

        claim.spec.node_name = node.clone();
        claim
            .labels_mut()
            .insert(NODE_LABEL.to_string(), node.clone());

        match self.claims.update(&claim).await {
            Ok(_) => {
                info!(claim = %name, node = %node, "assigned claim to node");
            }
            Err(e) => {
                warn!(claim = %name, node = %node, error = %e, "failed to assign claim");
            }
        }
    }

    /// Deterministic node selection policy
    ///
    /// The lexicographically smallest name among listed nodes not
    /// classified dead. Nodes the monitor has never observed are eligible:
    /// they are unproven, not stale.
    fn select_node(&self, nodes: &[IpNode]) -> Option<String> {
        let liveness = self.liveness();
        nodes
            .iter()
            .map(|node| node.name_any())
            .filter(|name| !liveness.is_dead(name))
            .min()
    }
}
