//! Cluster and attribute identifiers the commissioner reads.

use crate::ids::{AttributeId, ClusterId};

/// Global feature-map attribute, present on every cluster.
pub const FEATURE_MAP: AttributeId = 0xFFFC;

/// Basic Information cluster.
pub mod basic_information {
    use super::{AttributeId, ClusterId};

    /// Cluster id
    pub const ID: ClusterId = 0x0028;
    /// VendorID attribute
    pub const VENDOR_ID: AttributeId = 0x0002;
    /// ProductID attribute
    pub const PRODUCT_ID: AttributeId = 0x0004;
}

/// General Commissioning cluster.
pub mod general_commissioning {
    use super::{AttributeId, ClusterId};

    /// Cluster id
    pub const ID: ClusterId = 0x0030;
    /// Breadcrumb attribute
    pub const BREADCRUMB: AttributeId = 0x0000;
    /// BasicCommissioningInfo attribute (struct, field 0 = fail-safe seconds)
    pub const BASIC_COMMISSIONING_INFO: AttributeId = 0x0001;
    /// RegulatoryConfig attribute
    pub const REGULATORY_CONFIG: AttributeId = 0x0002;
    /// LocationCapability attribute
    pub const LOCATION_CAPABILITY: AttributeId = 0x0003;
    /// SupportsConcurrentConnection attribute
    pub const SUPPORTS_CONCURRENT_CONNECTION: AttributeId = 0x0004;
    /// TCMinRequiredVersion attribute
    pub const TC_MIN_REQUIRED_VERSION: AttributeId = 0x0006;
    /// TCAcknowledgementsRequired attribute
    pub const TC_ACKNOWLEDGEMENTS_REQUIRED: AttributeId = 0x0008;
}

/// Network Commissioning cluster.
pub mod network_commissioning {
    use super::{AttributeId, ClusterId};

    /// Cluster id
    pub const ID: ClusterId = 0x0031;
    /// ScanMaxTimeSeconds attribute
    pub const SCAN_MAX_TIME_SECONDS: AttributeId = 0x0002;
    /// ConnectMaxTimeSeconds attribute
    pub const CONNECT_MAX_TIME_SECONDS: AttributeId = 0x0003;
}

/// Time Synchronization cluster.
pub mod time_synchronization {
    use super::{AttributeId, ClusterId};

    /// Cluster id
    pub const ID: ClusterId = 0x0038;
    /// TimeZoneListMaxSize attribute
    pub const TIME_ZONE_LIST_MAX_SIZE: AttributeId = 0x000A;
    /// DSTOffsetListMaxSize attribute
    pub const DST_OFFSET_LIST_MAX_SIZE: AttributeId = 0x000B;
}

/// Operational Credentials cluster.
pub mod operational_credentials {
    use super::{AttributeId, ClusterId};

    /// Cluster id
    pub const ID: ClusterId = 0x003E;
    /// Fabrics attribute (list of fabric descriptors)
    pub const FABRICS: AttributeId = 0x0001;
    /// TrustedRootCertificates attribute
    pub const TRUSTED_ROOT_CERTIFICATES: AttributeId = 0x0004;

    /// Fabric descriptor field: root public key
    pub const FABRIC_ROOT_PUBLIC_KEY: u8 = 1;
    /// Fabric descriptor field: vendor id
    pub const FABRIC_VENDOR_ID: u8 = 2;
    /// Fabric descriptor field: fabric id
    pub const FABRIC_ID: u8 = 3;
    /// Fabric descriptor field: node id
    pub const FABRIC_NODE_ID: u8 = 4;
    /// Fabric descriptor field: fabric index
    pub const FABRIC_INDEX: u8 = 254;
}

/// ICD Management cluster.
pub mod icd_management {
    use super::{AttributeId, ClusterId};

    /// Cluster id
    pub const ID: ClusterId = 0x0046;
    /// IdleModeDuration attribute (seconds)
    pub const IDLE_MODE_DURATION: AttributeId = 0x0000;
    /// ActiveModeDuration attribute (milliseconds)
    pub const ACTIVE_MODE_DURATION: AttributeId = 0x0001;
    /// ActiveModeThreshold attribute (milliseconds)
    pub const ACTIVE_MODE_THRESHOLD: AttributeId = 0x0002;
    /// UserActiveModeTriggerHint attribute
    pub const USER_ACTIVE_MODE_TRIGGER_HINT: AttributeId = 0x0006;
    /// OperatingMode attribute (0 = SIT, 1 = LIT)
    pub const OPERATING_MODE: AttributeId = 0x0008;
}
