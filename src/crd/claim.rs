//! IpClaim Custom Resource Definition
//!
//! An IpClaim asserts that a specific external IP/CIDR should be routed to
//! some node. Claims are created by the service watcher, assigned by the
//! claim watcher, and invalidated by the node monitor when their node dies.

use kube::CustomResource;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Label key carrying the assigned node name on an IpClaim
///
/// The label mirrors `spec.nodeName` so the monitor can find a dead node's
/// claims with a plain label filter.
pub const NODE_LABEL: &str = "ipnode";

/// Specification for an IpClaim
///
/// A claim is unassigned while `node_name` is the empty string; the claim
/// watcher fills it in and the node monitor clears it again when the node
/// stops heartbeating.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "extip.dev",
    version = "v1alpha1",
    kind = "IpClaim",
    plural = "ipclaims",
    shortname = "ipc",
    namespaced = false,
    printcolumn = r#"{"name":"Cidr","type":"string","jsonPath":".spec.cidr"}"#,
    printcolumn = r#"{"name":"Node","type":"string","jsonPath":".spec.nodeName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IpClaimSpec {
    /// The claimed address in `<ip>/<mask>` form
    pub cidr: String,

    /// Name of the node the address is routed to; empty means unassigned
    #[serde(default)]
    pub node_name: String,
}

/// Derive the deterministic claim name `<ip>-<mask>` for an external IP
pub fn claim_name(ip: &str, mask: &str) -> String {
    format!("{ip}-{mask}")
}

/// Derive the claim CIDR `<ip>/<mask>` for an external IP
pub fn claim_cidr(ip: &str, mask: &str) -> String {
    format!("{ip}/{mask}")
}

impl IpClaim {
    /// Build the claim for one service external IP under the given mask
    pub fn for_ip(ip: &str, mask: &str) -> Self {
        IpClaim::new(
            &claim_name(ip, mask),
            IpClaimSpec {
                cidr: claim_cidr(ip, mask),
                node_name: String::new(),
            },
        )
    }

    /// Returns true if this claim is currently assigned to a node
    pub fn is_assigned(&self) -> bool {
        !self.spec.node_name.is_empty()
    }

    /// Returns true if this claim is labeled as assigned to `node`
    pub fn is_assigned_to(&self, node: &str) -> bool {
        self.labels().get(NODE_LABEL).map(String::as_str) == Some(node)
    }
}
