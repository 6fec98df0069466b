//! Feature-map bit sets the commissioner inspects.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Network Commissioning cluster features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct NetworkCommissioningFeatures: u32 {
        /// Wi-Fi network interface
        const WIFI = 1 << 0;
        /// Thread network interface
        const THREAD = 1 << 1;
        /// Ethernet network interface
        const ETHERNET = 1 << 2;
    }
}

bitflags! {
    /// Time Synchronization cluster features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct TimeSyncFeatures: u32 {
        /// Time zone support
        const TIME_ZONE = 1 << 0;
        /// NTP client
        const NTP_CLIENT = 1 << 1;
        /// NTP server
        const NTP_SERVER = 1 << 2;
        /// Trusted time source client
        const TIME_SYNC_CLIENT = 1 << 3;
    }
}

bitflags! {
    /// ICD Management cluster features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct IcdFeatures: u32 {
        /// Check-in protocol
        const CHECK_IN = 1 << 0;
        /// User active mode trigger
        const USER_ACTIVE_MODE_TRIGGER = 1 << 1;
        /// Long idle time (LIT)
        const LONG_IDLE_TIME = 1 << 2;
        /// Dynamic SIT/LIT switching
        const DYNAMIC_SIT_LIT = 1 << 3;
    }
}
