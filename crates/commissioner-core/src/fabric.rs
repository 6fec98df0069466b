//! Fabric identity and NOC lifecycle.
//!
//! [`FabricSessionController`] owns the commissioner's own identity on the
//! fabric it administers. Storage of certificate material belongs to a
//! [`FabricTable`] collaborator; the controller only decides when to add,
//! update, commit, revert or delete.
//!
//! # Lifecycle
//!
//! ```text
//!   init ──► add_noc ──► commit ──► identity present
//!                                       │
//!                update_noc ──► commit ─┤ (on failure: revert, identity unchanged)
//!                                       │
//!                    shutdown / delete ─┴──► identity gone
//! ```

use commissioner_proto::{CompressedFabricId, FabricId, FabricIndex, NodeId, PeerId, VendorId};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::{info, warn};

use crate::error::CommissioningError;

/// HKDF info string for compressed fabric id derivation.
const COMPRESSED_FABRIC_INFO: &[u8] = b"CompressedFabric";

/// Identity of this commissioner on its fabric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricIdentity {
    /// Local fabric table index
    pub fabric_index: FabricIndex,
    /// Fabric id
    pub fabric_id: FabricId,
    /// Commissioner's own node id
    pub node_id: NodeId,
    /// Root public key of the fabric
    pub root_public_key: Vec<u8>,
    /// Compressed fabric id derived from root key and fabric id
    pub compressed_fabric_id: CompressedFabricId,
    /// Administrator vendor id
    pub vendor_id: VendorId,
}

/// Certificate material for the commissioner's own NOC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NocMaterial {
    /// Root certificate
    pub rcac: Vec<u8>,
    /// Intermediate certificate
    pub icac: Option<Vec<u8>>,
    /// Node operational certificate
    pub noc: Vec<u8>,
    /// Root public key carried by `rcac`
    pub root_public_key: Vec<u8>,
    /// Fabric id carried by `noc`
    pub fabric_id: FabricId,
    /// Node id carried by `noc`
    pub node_id: NodeId,
    /// Administrator vendor id
    pub vendor_id: VendorId,
}

/// Persistent store of fabric credentials.
///
/// Adds and updates are staged until [`FabricTable::commit_pending`].
pub trait FabricTable {
    /// Stage a new fabric. Returns the index it will occupy.
    fn add_noc(&mut self, material: &NocMaterial) -> Result<FabricIndex, CommissioningError>;

    /// Stage a replacement NOC for an existing fabric.
    fn update_noc(
        &mut self,
        index: FabricIndex,
        noc: &[u8],
        icac: Option<&[u8]>,
    ) -> Result<(), CommissioningError>;

    /// Make staged changes durable.
    fn commit_pending(&mut self) -> Result<(), CommissioningError>;

    /// Drop staged changes.
    fn revert_pending(&mut self);

    /// Remove a fabric.
    fn delete(&mut self, index: FabricIndex) -> Result<(), CommissioningError>;
}

/// Derive the compressed fabric id.
///
/// Uncompressed SEC1 keys have their leading `0x04` stripped before use.
pub fn compressed_fabric_id(
    root_public_key: &[u8],
    fabric_id: FabricId,
) -> Result<CompressedFabricId, CommissioningError> {
    let key = match root_public_key {
        [] => return Err(CommissioningError::InvalidArgument("empty root public key")),
        [0x04, rest @ ..] if root_public_key.len() == 65 => rest,
        key => key,
    };

    let hk = Hkdf::<Sha256>::new(Some(&fabric_id.0.to_be_bytes()), key);
    let mut out = [0u8; 8];
    hk.expand(COMPRESSED_FABRIC_INFO, &mut out)
        .map_err(|_| CommissioningError::InvalidArgument("compressed fabric id length"))?;
    Ok(CompressedFabricId(u64::from_be_bytes(out)))
}

/// Owner of the commissioner's fabric identity.
pub struct FabricSessionController {
    table: Box<dyn FabricTable>,
    identity: Option<FabricIdentity>,
}

impl FabricSessionController {
    /// Create a controller with no identity.
    pub fn new(table: Box<dyn FabricTable>) -> Self {
        Self { table, identity: None }
    }

    /// Install the commissioner's NOC chain and create its identity.
    pub fn init(&mut self, material: &NocMaterial) -> Result<&FabricIdentity, CommissioningError> {
        if self.identity.is_some() {
            return Err(CommissioningError::IncorrectState("fabric identity already initialized"));
        }
        let compressed = compressed_fabric_id(&material.root_public_key, material.fabric_id)?;

        let fabric_index = self.table.add_noc(material)?;
        if let Err(e) = self.table.commit_pending() {
            self.table.revert_pending();
            return Err(e);
        }

        info!(fabric = %compressed, node_id = %material.node_id, "fabric identity initialized");
        Ok(self.identity.insert(FabricIdentity {
            fabric_index,
            fabric_id: material.fabric_id,
            node_id: material.node_id,
            root_public_key: material.root_public_key.clone(),
            compressed_fabric_id: compressed,
            vendor_id: material.vendor_id,
        }))
    }

    /// Current identity, if initialized.
    pub fn identity(&self) -> Option<&FabricIdentity> {
        self.identity.as_ref()
    }

    /// Current identity, or `IncorrectState`.
    pub fn require_identity(&self) -> Result<&FabricIdentity, CommissioningError> {
        self.identity.as_ref().ok_or(CommissioningError::IncorrectState("no fabric identity"))
    }

    /// Operational identity of `node_id` on this fabric.
    pub fn peer_id(&self, node_id: NodeId) -> Result<PeerId, CommissioningError> {
        let identity = self.require_identity()?;
        Ok(PeerId { compressed_fabric_id: identity.compressed_fabric_id, node_id })
    }

    /// Replace the commissioner's own NOC.
    ///
    /// Staged in the fabric table and committed. A failed commit is reverted
    /// and leaves the identity untouched.
    pub fn update_noc(
        &mut self,
        noc: &[u8],
        icac: Option<&[u8]>,
        node_id: NodeId,
    ) -> Result<(), CommissioningError> {
        let index = self.require_identity()?.fabric_index;
        if !node_id.is_operational() {
            return Err(CommissioningError::InvalidArgument("NOC node id is not operational"));
        }

        self.table.update_noc(index, noc, icac)?;
        if let Err(e) = self.table.commit_pending() {
            warn!(error = %e, "NOC update commit failed, reverting");
            self.table.revert_pending();
            return Err(e);
        }

        if let Some(identity) = self.identity.as_mut() {
            identity.node_id = node_id;
        }
        Ok(())
    }

    /// Remove the fabric from the table and drop the identity.
    pub fn delete_fabric(&mut self) -> Result<(), CommissioningError> {
        let index = self.require_identity()?.fabric_index;
        self.table.delete(index)?;
        self.identity = None;
        Ok(())
    }

    /// Drop the identity without touching stored credentials.
    pub fn shutdown(&mut self) -> Option<FabricIdentity> {
        self.identity.take()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[derive(Default)]
    struct TableLog {
        staged: usize,
        committed: usize,
        reverted: usize,
        deleted: Vec<FabricIndex>,
        fail_commit: bool,
    }

    struct MemoryTable(Rc<RefCell<TableLog>>);

    impl FabricTable for MemoryTable {
        fn add_noc(&mut self, _material: &NocMaterial) -> Result<FabricIndex, CommissioningError> {
            self.0.borrow_mut().staged += 1;
            Ok(FabricIndex(1))
        }

        fn update_noc(
            &mut self,
            _index: FabricIndex,
            _noc: &[u8],
            _icac: Option<&[u8]>,
        ) -> Result<(), CommissioningError> {
            self.0.borrow_mut().staged += 1;
            Ok(())
        }

        fn commit_pending(&mut self) -> Result<(), CommissioningError> {
            let mut log = self.0.borrow_mut();
            if log.fail_commit {
                return Err(CommissioningError::FabricTable("disk full".into()));
            }
            log.committed += 1;
            Ok(())
        }

        fn revert_pending(&mut self) {
            self.0.borrow_mut().reverted += 1;
        }

        fn delete(&mut self, index: FabricIndex) -> Result<(), CommissioningError> {
            self.0.borrow_mut().deleted.push(index);
            Ok(())
        }
    }

    fn material() -> NocMaterial {
        NocMaterial {
            rcac: vec![1],
            icac: None,
            noc: vec![2],
            root_public_key: vec![0xAA; 32],
            fabric_id: FabricId(0x2906_C908_D115_D362),
            node_id: NodeId(0x1),
            vendor_id: VendorId(0xFFF1),
        }
    }

    #[test]
    fn compressed_fabric_id_strips_sec1_prefix() {
        let mut sec1 = vec![0x04];
        sec1.extend_from_slice(&[0x5A; 64]);
        let stripped = compressed_fabric_id(&sec1, FabricId(7)).unwrap();
        assert_eq!(stripped, compressed_fabric_id(&[0x5A; 64], FabricId(7)).unwrap());
        assert_ne!(stripped, compressed_fabric_id(&[0x5A; 64], FabricId(8)).unwrap());
    }

    #[test]
    fn compressed_fabric_id_rejects_empty_key() {
        assert!(compressed_fabric_id(&[], FabricId(1)).is_err());
    }

    #[test]
    fn init_commits_and_creates_identity() {
        let log = Rc::new(RefCell::new(TableLog::default()));
        let mut controller = FabricSessionController::new(Box::new(MemoryTable(log.clone())));

        let identity = controller.init(&material()).unwrap().clone();
        assert_eq!(identity.fabric_index, FabricIndex(1));
        assert_eq!(log.borrow().committed, 1);

        // Second init is a state violation
        assert!(matches!(
            controller.init(&material()),
            Err(CommissioningError::IncorrectState(_))
        ));

        let peer = controller.peer_id(NodeId(0x55)).unwrap();
        assert_eq!(peer.compressed_fabric_id, identity.compressed_fabric_id);
    }

    #[test]
    fn failed_update_reverts_and_keeps_identity() {
        let log = Rc::new(RefCell::new(TableLog::default()));
        let mut controller = FabricSessionController::new(Box::new(MemoryTable(log.clone())));
        controller.init(&material()).unwrap();

        log.borrow_mut().fail_commit = true;
        let result = controller.update_noc(&[9], None, NodeId(0x2));
        assert!(matches!(result, Err(CommissioningError::FabricTable(_))));
        assert_eq!(log.borrow().reverted, 1);
        assert_eq!(controller.identity().unwrap().node_id, NodeId(0x1));

        log.borrow_mut().fail_commit = false;
        controller.update_noc(&[9], None, NodeId(0x2)).unwrap();
        assert_eq!(controller.identity().unwrap().node_id, NodeId(0x2));
    }

    #[test]
    fn delete_and_shutdown_drop_identity() {
        let log = Rc::new(RefCell::new(TableLog::default()));
        let mut controller = FabricSessionController::new(Box::new(MemoryTable(log.clone())));
        controller.init(&material()).unwrap();
        controller.delete_fabric().unwrap();
        assert!(controller.identity().is_none());
        assert_eq!(log.borrow().deleted, vec![FabricIndex(1)]);

        controller.init(&material()).unwrap();
        assert!(controller.shutdown().is_some());
        assert!(controller.peer_id(NodeId(1)).is_err());
    }
}
