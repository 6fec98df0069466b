//! Identifiers used on the device-facing surface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Endpoint number on a device.
pub type EndpointId = u16;

/// Cluster identifier.
pub type ClusterId = u32;

/// Attribute identifier within a cluster.
pub type AttributeId = u32;

/// 64-bit node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Sentinel for "no node id assigned".
    pub const UNDEFINED: Self = Self(0);

    /// Highest node id usable as an operational identity.
    pub const MAX_OPERATIONAL: u64 = 0xFFFF_FFEF_FFFF_FFFF;

    /// Whether this id is in the operational range.
    pub fn is_operational(self) -> bool {
        self.0 != 0 && self.0 <= Self::MAX_OPERATIONAL
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

/// 64-bit fabric identifier chosen by the fabric administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FabricId(pub u64);

/// Local index of a fabric in a fabric table. Zero is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FabricIndex(pub u8);

impl FabricIndex {
    /// Whether the index refers to an actual table slot.
    pub fn is_valid(self) -> bool {
        self.0 != 0 && self.0 != 0xFF
    }
}

/// Vendor identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub u16);

/// Compressed fabric identifier derived from the root public key and fabric
/// id. Used to scope operational discovery and session lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CompressedFabricId(pub u64);

impl fmt::Display for CompressedFabricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

/// Operational identity of a node: which fabric, which node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId {
    /// Fabric scope
    pub compressed_fabric_id: CompressedFabricId,
    /// Node within the fabric
    pub node_id: NodeId,
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.compressed_fabric_id, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operational_range() {
        assert!(!NodeId::UNDEFINED.is_operational());
        assert!(NodeId(1).is_operational());
        assert!(NodeId(NodeId::MAX_OPERATIONAL).is_operational());
        assert!(!NodeId(NodeId::MAX_OPERATIONAL + 1).is_operational());
    }

    #[test]
    fn peer_id_display() {
        let peer =
            PeerId { compressed_fabric_id: CompressedFabricId(0xABCD), node_id: NodeId(0x12) };
        assert_eq!(peer.to_string(), "000000000000ABCD-0000000000000012");
    }
}
