//! Node monitor loop
//!
//! Periodically compares each IpNode's generation counter against the
//! previous sweep. A node whose counter did not advance across one full
//! interval is declared dead and every claim labeled with it is returned
//! to the unassigned pool. Each tick runs to completion before the next
//! one is consumed, so at most one sweep is in flight.

use futures::{Stream, StreamExt};
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::IpClaimScheduler;

impl IpClaimScheduler {
    /// Run the node monitor until cancellation or tick stream end
    pub async fn monitor_ip_nodes<S>(&self, mut ticks: S, stop: CancellationToken)
    where
        S: Stream<Item = ()> + Unpin,
    {
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    debug!("node monitor stopping");
                    break;
                }
                tick = ticks.next() => {
                    match tick {
                        Some(()) => self.sweep_nodes().await,
                        None => break,
                    }
                }
            }
        }
    }

    /// One monitor sweep: reclassify nodes, then release dead nodes' claims
    async fn sweep_nodes(&self) {
        let nodes = match self.nodes.list().await {
            Ok(nodes) => nodes,
            Err(e) => {
                warn!(error = %e, "failed to list nodes, skipping sweep");
                return;
            }
        };

        let newly_dead = self.liveness().observe(&nodes);

        for node in newly_dead {
            info!(node = %node, "node stopped heartbeating, releasing its claims");
            self.release_node_claims(&node).await;
        }
    }

    /// Clear the assignment of every claim labeled with a dead node
    async fn release_node_claims(&self, node: &str) {
        let claims = match self.claims.list().await {
            Ok(claims) => claims,
            Err(e) => {
                warn!(node = %node, error = %e, "failed to list claims for dead node");
                return;
            }
        };

        for mut claim in claims {
            if !claim.is_assigned_to(node) {
                continue;
            }

            let name = claim.name_any();
            claim.spec.node_name = String::new();
            claim.metadata.labels = Some(Default::default());

            match self.claims.update(&claim).await {
                Ok(_) => {
                    info!(claim = %name, node = %node, "cleared assignment of claim on dead node");
                }
                Err(e) => {
                    warn!(claim = %name, node = %node, error = %e, "failed to clear claim assignment");
                }
            }
        }
    }
}
