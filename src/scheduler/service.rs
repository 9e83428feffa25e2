//! Service watcher loop
//!
//! Translates Service external IPs into IpClaim lifecycles: one create per
//! (service, external IP) on apply, one delete per (service, external IP)
//! on removal. Store failures are logged and skipped; correctness is
//! restored by later events, not by retrying here.

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::IpClaimScheduler;
use crate::crd::{claim_name, IpClaim};
use crate::store::WatchEvent;

/// External IPs declared on a service spec
fn external_ips(service: &Service) -> Vec<String> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.external_ips.clone())
        .unwrap_or_default()
}

impl IpClaimScheduler {
    /// Run the service watcher until cancellation or stream end
    pub async fn service_watcher<S>(&self, mut events: S, stop: CancellationToken)
    where
        S: Stream<Item = WatchEvent<Service>> + Unpin,
    {
        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    debug!("service watcher stopping");
                    break;
                }
                event = events.next() => {
                    match event {
                        Some(WatchEvent::Applied(service)) => self.claim_service_ips(&service).await,
                        Some(WatchEvent::Deleted(service)) => self.release_service_ips(&service).await,
                        None => break,
                    }
                }
            }
        }
    }

    /// Create one claim per external IP of an applied service
    async fn claim_service_ips(&self, service: &Service) {
        let service_name = service.name_any();

        for ip in external_ips(service) {
            let claim = IpClaim::for_ip(&ip, &self.default_mask);
            let name = claim.name_any();

            match self.claims.create(&claim).await {
                Ok(_) => {
                    info!(service = %service_name, claim = %name, "created ip claim");
                }
                Err(e) => {
                    // AlreadyExists is expected on event re-delivery
                    warn!(service = %service_name, claim = %name, error = %e, "failed to create ip claim");
                }
            }
        }
    }

    /// Delete the derived claim for each external IP of a deleted service
    async fn release_service_ips(&self, service: &Service) {
        let service_name = service.name_any();

        for ip in external_ips(service) {
            let name = claim_name(&ip, &self.default_mask);

            match self.claims.delete(&name).await {
                Ok(()) => {
                    info!(service = %service_name, claim = %name, "deleted ip claim");
                }
                Err(e) => {
                    warn!(service = %service_name, claim = %name, error = %e, "failed to delete ip claim");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::ServiceSpec;
    use kube::api::ObjectMeta;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;
    use crate::store::{MockClaimOps, MockNodeOps};

    fn service(name: &str, ips: &[&str]) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                external_ips: Some(ips.iter().map(|ip| ip.to_string()).collect()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn scheduler(claims: MockClaimOps) -> IpClaimScheduler {
        IpClaimScheduler::new("24", Arc::new(claims), Arc::new(MockNodeOps::new())).unwrap()
    }

    #[tokio::test]
    async fn applied_service_creates_derived_claim() {
        let mut claims = MockClaimOps::new();
        claims
            .expect_create()
            .withf(|claim: &IpClaim| {
                claim.name_any() == "10.10.0.2-24" && claim.spec.cidr == "10.10.0.2/24"
            })
            .times(1)
            .returning(|claim| Ok(claim.clone()));

        let scheduler = scheduler(claims);
        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchEvent::Applied(service("test0", &["10.10.0.2"])))
            .await
            .unwrap();
        drop(tx);

        scheduler
            .service_watcher(ReceiverStream::new(rx), CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn deleted_service_deletes_derived_claim() {
        let mut claims = MockClaimOps::new();
        claims
            .expect_delete()
            .withf(|name: &str| name == "10.10.0.2-24")
            .times(1)
            .returning(|_| Ok(()));

        let scheduler = scheduler(claims);
        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchEvent::Deleted(service("test0", &["10.10.0.2"])))
            .await
            .unwrap();
        drop(tx);

        scheduler
            .service_watcher(ReceiverStream::new(rx), CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn one_create_per_external_ip() {
        let mut claims = MockClaimOps::new();
        claims
            .expect_create()
            .withf(|claim: &IpClaim| claim.name_any() == "10.10.0.2-24")
            .times(1)
            .returning(|claim| Ok(claim.clone()));
        claims
            .expect_create()
            .withf(|claim: &IpClaim| claim.name_any() == "10.10.0.3-24")
            .times(1)
            .returning(|claim| Ok(claim.clone()));

        let scheduler = scheduler(claims);
        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchEvent::Applied(service(
            "test0",
            &["10.10.0.2", "10.10.0.3"],
        )))
        .await
        .unwrap();
        drop(tx);

        scheduler
            .service_watcher(ReceiverStream::new(rx), CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn create_failure_does_not_stop_the_loop() {
        let mut claims = MockClaimOps::new();
        claims
            .expect_create()
            .withf(|claim: &IpClaim| claim.name_any() == "10.10.0.2-24")
            .times(1)
            .returning(|_| Err(crate::Error::validation("already exists")));
        claims
            .expect_delete()
            .withf(|name: &str| name == "10.10.0.2-24")
            .times(1)
            .returning(|_| Ok(()));

        let scheduler = scheduler(claims);
        let (tx, rx) = mpsc::channel(4);
        let svc = service("test0", &["10.10.0.2"]);
        tx.send(WatchEvent::Applied(svc.clone())).await.unwrap();
        tx.send(WatchEvent::Deleted(svc)).await.unwrap();
        drop(tx);

        scheduler
            .service_watcher(ReceiverStream::new(rx), CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn service_without_external_ips_is_ignored() {
        let scheduler = scheduler(MockClaimOps::new());
        let (tx, rx) = mpsc::channel(4);
        tx.send(WatchEvent::Applied(service("test0", &[])))
            .await
            .unwrap();
        drop(tx);

        scheduler
            .service_watcher(ReceiverStream::new(rx), CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let scheduler = Arc::new(scheduler(MockClaimOps::new()));
        let (_tx, rx) = mpsc::channel::<WatchEvent<Service>>(1);
        let stop = CancellationToken::new();

        let handle = {
            let scheduler = scheduler.clone();
            let stop = stop.clone();
            tokio::spawn(
                async move { scheduler.service_watcher(ReceiverStream::new(rx), stop).await },
            )
        };

        stop.cancel();
        handle.await.unwrap();
    }
}
