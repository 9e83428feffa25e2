//! IpNode Custom Resource Definition
//!
//! An IpNode represents a cluster member eligible to host IP claims. The
//! controller never writes these: a heartbeat agent on each node touches
//! its IpNode periodically, which bumps `metadata.generation`, and the
//! node monitor reads that counter as a liveness proxy.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for an IpNode
///
/// Liveness is derived entirely from `metadata.generation`; the spec
/// carries nothing the controller reads.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "extip.dev",
    version = "v1alpha1",
    kind = "IpNode",
    plural = "ipnodes",
    shortname = "ipn",
    namespaced = false,
    printcolumn = r#"{"name":"Generation","type":"integer","jsonPath":".metadata.generation"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct IpNodeSpec {}

impl IpNode {
    /// Last generation reported by the node's heartbeat agent
    pub fn generation(&self) -> i64 {
        self.metadata.generation.unwrap_or(0)
    }
}
