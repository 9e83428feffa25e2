//! Custom Resource Definitions for extip
//!
//! This module contains the CRDs owned by the controller: IpClaim (the
//! unit of allocation) and IpNode (the liveness proxy for a cluster
//! member). Services are watched through the stock core/v1 type and are
//! not defined here.

mod claim;
mod node;

pub use claim::{claim_cidr, claim_name, IpClaim, IpClaimSpec, NODE_LABEL};
pub use node::{IpNode, IpNodeSpec};
