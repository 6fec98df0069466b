//! Commissionee proxies and their pool.
//!
//! A [`CommissioneeDeviceProxy`] represents one device during PASE-secured
//! provisioning. Proxies live in a fixed-capacity [`DeviceProxyPool`] and are
//! addressed through generation-checked [`DeviceHandle`]s, so a handle kept
//! past release resolves to nothing rather than to a recycled slot.

use std::{fmt, net::SocketAddr};

use commissioner_proto::NodeId;

use crate::{error::CommissioningError, failsafe::FailSafeTimer};

/// How a commissionee is reached before it has operational credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    /// IP transport
    Udp(SocketAddr),
    /// Bluetooth LE, identified by its advertised discriminator
    Ble {
        /// 12-bit discriminator
        discriminator: u16,
    },
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp(addr) => write!(f, "udp:{addr}"),
            Self::Ble { discriminator } => write!(f, "ble:{discriminator:03X}"),
        }
    }
}

/// Generation-checked reference to a pooled proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    slot: usize,
    generation: u32,
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}.{}", self.slot, self.generation)
    }
}

/// Established PASE session state the engine needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaseSession {
    /// Session-derived challenge bound into attestation and CSR signatures
    pub attestation_challenge: [u8; 16],
    /// Local session id
    pub session_id: u16,
}

/// One device being provisioned over PASE.
#[derive(Debug, Clone)]
pub struct CommissioneeDeviceProxy {
    /// Temporary id used until the device has an operational identity
    pub temporary_id: NodeId,
    /// Where the device is reached
    pub address: PeerAddress,
    /// PASE session, once established
    pub pase: Option<PaseSession>,
    /// Fail-safe deadline tracking
    pub fail_safe: FailSafeTimer,
    /// Operational node id, once the NOC is installed
    pub operational_node_id: Option<NodeId>,
}

impl CommissioneeDeviceProxy {
    /// Whether a PASE session is up.
    pub fn is_secure(&self) -> bool {
        self.pase.is_some()
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    proxy: Option<CommissioneeDeviceProxy>,
}

/// Fixed-capacity pool of commissionee proxies.
#[derive(Debug)]
pub struct DeviceProxyPool {
    slots: Vec<Slot>,
}

impl DeviceProxyPool {
    /// Pool with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self { slots: (0..capacity).map(|_| Slot { generation: 0, proxy: None }).collect() }
    }

    /// Place a new proxy into a free slot.
    ///
    /// # Errors
    ///
    /// `NoMemory` when every slot is occupied.
    pub fn allocate(
        &mut self,
        temporary_id: NodeId,
        address: PeerAddress,
    ) -> Result<DeviceHandle, CommissioningError> {
        let (slot, entry) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, s)| s.proxy.is_none())
            .ok_or(CommissioningError::NoMemory)?;

        entry.proxy = Some(CommissioneeDeviceProxy {
            temporary_id,
            address,
            pase: None,
            fail_safe: FailSafeTimer::new(),
            operational_node_id: None,
        });
        Ok(DeviceHandle { slot, generation: entry.generation })
    }

    /// Handle of the live proxy with this temporary id.
    pub fn find(&self, temporary_id: NodeId) -> Option<DeviceHandle> {
        self.slots.iter().enumerate().find_map(|(slot, s)| {
            s.proxy
                .as_ref()
                .filter(|p| p.temporary_id == temporary_id)
                .map(|_| DeviceHandle { slot, generation: s.generation })
        })
    }

    /// Proxy behind `handle`, if it is still live.
    pub fn get(&self, handle: DeviceHandle) -> Option<&CommissioneeDeviceProxy> {
        self.slots
            .get(handle.slot)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.proxy.as_ref())
    }

    /// Mutable proxy behind `handle`, if it is still live.
    pub fn get_mut(&mut self, handle: DeviceHandle) -> Option<&mut CommissioneeDeviceProxy> {
        self.slots
            .get_mut(handle.slot)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.proxy.as_mut())
    }

    /// Release the proxy behind `handle`. Returns it if the handle was live.
    pub fn release(&mut self, handle: DeviceHandle) -> Option<CommissioneeDeviceProxy> {
        let slot = self.slots.get_mut(handle.slot).filter(|s| s.generation == handle.generation)?;
        let proxy = slot.proxy.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(proxy)
    }

    /// Number of live proxies.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.proxy.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ble(d: u16) -> PeerAddress {
        PeerAddress::Ble { discriminator: d }
    }

    #[test]
    fn stale_handle_does_not_reach_recycled_slot() {
        let mut pool = DeviceProxyPool::new(1);
        let first = pool.allocate(NodeId(1), ble(0xF00)).unwrap();
        assert!(pool.release(first).is_some());

        let second = pool.allocate(NodeId(2), ble(0xF01)).unwrap();
        assert_ne!(first, second);
        assert!(pool.get(first).is_none());
        assert!(pool.release(first).is_none());
        assert_eq!(pool.get(second).unwrap().temporary_id, NodeId(2));
    }

    #[test]
    fn exhausted_pool_reports_no_memory() {
        let mut pool = DeviceProxyPool::new(2);
        pool.allocate(NodeId(1), ble(1)).unwrap();
        pool.allocate(NodeId(2), ble(2)).unwrap();
        assert_eq!(pool.allocate(NodeId(3), ble(3)), Err(CommissioningError::NoMemory));
        assert_eq!(pool.in_use(), 2);
        assert_eq!(pool.find(NodeId(2)).map(|h| pool.get(h).is_some()), Some(true));
    }
}
