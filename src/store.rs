//! Kubernetes API access for the controller
//!
//! The scheduler talks to the API server through two small traits so the
//! reconciliation loops can be exercised against mocks in tests while the
//! real binary wires them to `kube::Api`. Watch input arrives as plain
//! streams of [`WatchEvent`], produced here by adapting the kube-rs
//! watcher.

use std::fmt::Debug;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Service;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::crd::{IpClaim, IpNode};
use crate::Error;

/// A single notification from a watch stream
///
/// The kube watcher does not distinguish creations from updates and
/// re-delivers the full current state on every relist, so consumers must
/// treat `Applied` as at-least-once and idempotent.
#[derive(Clone, Debug)]
pub enum WatchEvent<T> {
    /// The object exists with the carried state (created or updated)
    Applied(T),
    /// The object was removed from the store
    Deleted(T),
}

/// IpClaim store operations used by the scheduler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClaimOps: Send + Sync {
    /// Create a new claim; fails if a claim with that name already exists
    async fn create(&self, claim: &IpClaim) -> Result<IpClaim, Error>;

    /// Replace an existing claim with the given state
    async fn update(&self, claim: &IpClaim) -> Result<IpClaim, Error>;

    /// Delete the claim with the given name
    async fn delete(&self, name: &str) -> Result<(), Error>;

    /// List all claims
    async fn list(&self) -> Result<Vec<IpClaim>, Error>;
}

/// IpNode store operations used by the scheduler
///
/// Read-only: node creation and generation bumps belong to the per-node
/// heartbeat agent, not to this controller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeOps: Send + Sync {
    /// List all nodes
    async fn list(&self) -> Result<Vec<IpNode>, Error>;
}

/// Real IpClaim client backed by the cluster-scoped IpClaim API
pub struct ClaimClient {
    api: Api<IpClaim>,
}

impl ClaimClient {
    /// Create a claim client from a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl ClaimOps for ClaimClient {
    async fn create(&self, claim: &IpClaim) -> Result<IpClaim, Error> {
        Ok(self.api.create(&PostParams::default(), claim).await?)
    }

    async fn update(&self, claim: &IpClaim) -> Result<IpClaim, Error> {
        Ok(self
            .api
            .replace(&claim.name_any(), &PostParams::default(), claim)
            .await?)
    }

    async fn delete(&self, name: &str) -> Result<(), Error> {
        self.api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<IpClaim>, Error> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }
}

/// Real IpNode client backed by the cluster-scoped IpNode API
pub struct NodeClient {
    api: Api<IpNode>,
}

impl NodeClient {
    /// Create a node client from a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeOps for NodeClient {
    async fn list(&self) -> Result<Vec<IpNode>, Error> {
        Ok(self.api.list(&ListParams::default()).await?.items)
    }
}

/// Watch all Services and adapt the stream to [`WatchEvent`]s
pub fn service_events(client: Client) -> impl Stream<Item = WatchEvent<Service>> {
    event_stream(Api::all(client))
}

/// Watch all IpClaims and adapt the stream to [`WatchEvent`]s
pub fn claim_events(client: Client) -> impl Stream<Item = WatchEvent<IpClaim>> {
    event_stream(Api::all(client))
}

/// Adapt a kube watcher into a stream of [`WatchEvent`]s
///
/// Relist bookkeeping (`Init`/`InitDone`) is dropped and `InitApply` is
/// folded into `Applied`. Watch errors are logged and skipped; the
/// built-in backoff re-establishes the watch.
fn event_stream<K>(api: Api<K>) -> impl Stream<Item = WatchEvent<K>>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    watcher(api, watcher::Config::default().any_semantic())
        .default_backoff()
        .filter_map(|step| async move {
            match step {
                Ok(watcher::Event::Apply(obj)) | Ok(watcher::Event::InitApply(obj)) => {
                    Some(WatchEvent::Applied(obj))
                }
                Ok(watcher::Event::Delete(obj)) => Some(WatchEvent::Deleted(obj)),
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                Err(e) => {
                    warn!(error = %e, "watch stream error");
                    None
                }
            }
        })
}
