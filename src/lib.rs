//! extip - Kubernetes external IP controller
//!
//! extip allocates externally-routable IP addresses to cluster nodes on
//! behalf of exposed services and keeps that allocation consistent with
//! node liveness. Three long-lived loops share one scheduler instance:
//!
//! - the service watcher turns Service external IPs into [`crd::IpClaim`]
//!   resources,
//! - the claim watcher assigns each unassigned claim to a node,
//! - the node monitor detects nodes whose generation counter stopped
//!   advancing and returns their claims to the unassigned pool.
//!
//! The loops communicate only through the Kubernetes API and through the
//! mutex-guarded liveness state inside the scheduler, so the system
//! converges under arbitrary event interleaving.
//!
//! # Modules
//!
//! - [`crd`] - IpClaim/IpNode Custom Resource Definitions
//! - [`store`] - API access traits, clients, and watch event streams
//! - [`scheduler`] - the three reconciliation loops and liveness state
//! - [`retry`] - bounded backoff for startup-path API calls
//! - [`error`] - error types for the controller

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod retry;
pub mod scheduler;
pub mod store;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Default netmask bit width applied to every derived claim CIDR
pub const DEFAULT_MASK: &str = "24";
