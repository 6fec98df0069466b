//! Commissioning-info read.
//!
//! One read exchange carries at most a fixed number of attribute paths, while
//! the set of paths depends on what the attempt needs. The reader walks the
//! full, deterministically ordered path list on every request and takes the
//! next slice that fits:
//!
//! ```text
//!   paths:     [p0 p1 p2 p3 p4 p5 p6 p7 p8 p9 p10 p11]    capacity = 5
//!   request 1:  └─────────────┘                            consumed 0 → 5
//!   request 2:                 └──────────────┘            consumed 5 → 10
//!   request 3:                                  └──────┘   walk ends within capacity
//! ```
//!
//! The policy deciding which paths are included is evaluated once, when the
//! read starts, and reused for every request so slices never shift.

use std::collections::BTreeMap;

use commissioner_proto::{
    AttributePath, AttributeValue, ConcreteAttributePath, EndpointId, FabricId, FabricIndex,
    IcdFeatures, NetworkCommissioningFeatures, NodeId, RegulatoryLocation, TimeSyncFeatures,
    VendorId,
    clusters::{
        FEATURE_MAP, basic_information, general_commissioning, icd_management,
        network_commissioning, operational_credentials, time_synchronization,
    },
};
use tracing::debug;

use crate::{
    error::CommissioningError,
    fabric::FabricIdentity,
    params::{CommissioningParameters, IcdRegistrationStrategy},
    report::{
        BasicInformation, GeneralCommissioningInfo, IcdInfo, MatchingFabric, NetworkEndpoint,
        NetworkInfo, ReadCommissioningInfo, TimeSyncInfo,
    },
};

/// Root endpoint hosting node-wide clusters.
pub const ROOT_ENDPOINT: EndpointId = 0;

/// Which optional sections to read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPolicy {
    /// Time Synchronization attributes
    pub time_sync: bool,
    /// Scan timing attributes
    pub network_scan: bool,
    /// Fabric list, to detect an existing fabric
    pub fabric_match: bool,
    /// ICD Management attributes
    pub icd: bool,
    /// Caller-requested paths, read last
    pub extra: Vec<AttributePath>,
}

impl ReadPolicy {
    /// Derive the policy for an attempt.
    pub fn from_params(params: &CommissioningParameters) -> Self {
        Self {
            time_sync: params.utc_time.is_some()
                || params.time_zone.is_some()
                || params.dst_offsets.is_some()
                || params.default_ntp.is_some()
                || params.trusted_time_source.is_some(),
            network_scan: params.attempt_wifi_network_scan || params.attempt_thread_network_scan,
            fabric_match: params.check_for_matching_fabric,
            icd: params.icd_registration_strategy != IcdRegistrationStrategy::Ignore
                || params.icd_stay_active_duration_ms.is_some(),
            extra: params.extra_read_paths.clone(),
        }
    }

    /// Full path list in read order.
    pub fn paths(&self) -> Vec<AttributePath> {
        let mut paths = vec![
            AttributePath::new(ROOT_ENDPOINT, basic_information::ID, basic_information::VENDOR_ID),
            AttributePath::new(ROOT_ENDPOINT, basic_information::ID, basic_information::PRODUCT_ID),
        ];
        paths.extend(
            [
                general_commissioning::BREADCRUMB,
                general_commissioning::BASIC_COMMISSIONING_INFO,
                general_commissioning::REGULATORY_CONFIG,
                general_commissioning::LOCATION_CAPABILITY,
                general_commissioning::SUPPORTS_CONCURRENT_CONNECTION,
                general_commissioning::TC_MIN_REQUIRED_VERSION,
                general_commissioning::TC_ACKNOWLEDGEMENTS_REQUIRED,
            ]
            .map(|attr| AttributePath::new(ROOT_ENDPOINT, general_commissioning::ID, attr)),
        );
        paths.push(AttributePath::wildcard(network_commissioning::ID, FEATURE_MAP));
        paths.push(AttributePath::wildcard(
            network_commissioning::ID,
            network_commissioning::CONNECT_MAX_TIME_SECONDS,
        ));

        if self.network_scan {
            paths.push(AttributePath::wildcard(
                network_commissioning::ID,
                network_commissioning::SCAN_MAX_TIME_SECONDS,
            ));
        }
        if self.time_sync {
            paths.extend(
                [
                    FEATURE_MAP,
                    time_synchronization::TIME_ZONE_LIST_MAX_SIZE,
                    time_synchronization::DST_OFFSET_LIST_MAX_SIZE,
                ]
                .map(|attr| AttributePath::new(ROOT_ENDPOINT, time_synchronization::ID, attr)),
            );
        }
        if self.fabric_match {
            paths.push(AttributePath::new(
                ROOT_ENDPOINT,
                operational_credentials::ID,
                operational_credentials::FABRICS,
            ));
        }
        if self.icd {
            paths.extend(
                [
                    FEATURE_MAP,
                    icd_management::IDLE_MODE_DURATION,
                    icd_management::ACTIVE_MODE_DURATION,
                    icd_management::ACTIVE_MODE_THRESHOLD,
                    icd_management::USER_ACTIVE_MODE_TRIGGER_HINT,
                    icd_management::OPERATING_MODE,
                ]
                .map(|attr| AttributePath::new(ROOT_ENDPOINT, icd_management::ID, attr)),
            );
        }
        paths.extend(self.extra.iter().copied());
        paths
    }
}

/// Paths for one read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBatch {
    /// Accepted paths
    pub paths: Vec<AttributePath>,
    /// Whether paths remain after this batch
    pub exceeded: bool,
}

/// Select the next slice of `paths`.
///
/// Entries already consumed by earlier requests are skipped; entries are
/// accepted until `capacity` is reached. `exceeded` is set the first time an
/// entry is turned away.
pub fn build_read_batch(paths: &[AttributePath], consumed: usize, capacity: usize) -> ReadBatch {
    let mut skip = consumed;
    let mut batch = ReadBatch { paths: Vec::with_capacity(capacity), exceeded: false };

    for path in paths {
        if skip > 0 {
            skip -= 1;
            continue;
        }
        if batch.paths.len() == capacity {
            batch.exceeded = true;
            break;
        }
        batch.paths.push(*path);
    }
    batch
}

type Cache = BTreeMap<ConcreteAttributePath, AttributeValue>;

fn lookup(
    cache: &Cache,
    endpoint: EndpointId,
    cluster: u32,
    attribute: u32,
) -> Option<&AttributeValue> {
    cache.get(&ConcreteAttributePath::new(endpoint, cluster, attribute))
}

fn required<'a>(
    cache: &'a Cache,
    cluster: u32,
    attribute: u32,
    errors: &mut Vec<CommissioningError>,
) -> Option<&'a AttributeValue> {
    let value = lookup(cache, ROOT_ENDPOINT, cluster, attribute);
    if value.is_none() {
        errors.push(CommissioningError::MissingAttribute { cluster, attribute });
    }
    value
}

fn narrow<T: TryFrom<u64>>(value: Option<&AttributeValue>) -> Option<T> {
    value.and_then(AttributeValue::as_u64).and_then(|v| T::try_from(v).ok())
}

fn regulatory(value: Option<&AttributeValue>) -> Option<RegulatoryLocation> {
    narrow::<u8>(value).and_then(RegulatoryLocation::from_u8)
}

fn parse_basic(cache: &Cache, errors: &mut Vec<CommissioningError>) -> BasicInformation {
    let vendor = required(cache, basic_information::ID, basic_information::VENDOR_ID, errors);
    let product = required(cache, basic_information::ID, basic_information::PRODUCT_ID, errors);
    BasicInformation { vendor_id: narrow::<u16>(vendor).map(VendorId), product_id: narrow(product) }
}

fn parse_general(cache: &Cache, errors: &mut Vec<CommissioningError>) -> GeneralCommissioningInfo {
    use general_commissioning as gc;

    let breadcrumb = required(cache, gc::ID, gc::BREADCRUMB, errors);
    let basic = required(cache, gc::ID, gc::BASIC_COMMISSIONING_INFO, errors);
    let capability = required(cache, gc::ID, gc::LOCATION_CAPABILITY, errors);

    GeneralCommissioningInfo {
        breadcrumb: breadcrumb.and_then(AttributeValue::as_u64).unwrap_or_default(),
        recommended_fail_safe_seconds: narrow(basic.and_then(|v| v.field(0))).unwrap_or_default(),
        regulatory_config: regulatory(lookup(cache, ROOT_ENDPOINT, gc::ID, gc::REGULATORY_CONFIG)),
        location_capability: regulatory(capability),
        supports_concurrent_connection: lookup(
            cache,
            ROOT_ENDPOINT,
            gc::ID,
            gc::SUPPORTS_CONCURRENT_CONNECTION,
        )
        .and_then(AttributeValue::as_bool)
        .unwrap_or(true),
        tc_min_required_version: narrow(lookup(
            cache,
            ROOT_ENDPOINT,
            gc::ID,
            gc::TC_MIN_REQUIRED_VERSION,
        )),
        tc_acknowledgements_required: lookup(
            cache,
            ROOT_ENDPOINT,
            gc::ID,
            gc::TC_ACKNOWLEDGEMENTS_REQUIRED,
        )
        .and_then(AttributeValue::as_bool)
        .unwrap_or(false),
    }
}

fn parse_network(cache: &Cache) -> NetworkInfo {
    use network_commissioning as nc;

    let endpoints = cache
        .iter()
        .filter(|(path, _)| path.cluster == nc::ID && path.attribute == FEATURE_MAP)
        .map(|(path, value)| NetworkEndpoint {
            endpoint: path.endpoint,
            features: NetworkCommissioningFeatures::from_bits_truncate(
                narrow(Some(value)).unwrap_or_default(),
            ),
            connect_max_time_seconds: narrow(lookup(
                cache,
                path.endpoint,
                nc::ID,
                nc::CONNECT_MAX_TIME_SECONDS,
            )),
            scan_max_time_seconds: narrow(lookup(
                cache,
                path.endpoint,
                nc::ID,
                nc::SCAN_MAX_TIME_SECONDS,
            )),
        })
        .collect();
    NetworkInfo { endpoints }
}

fn parse_time(cache: &Cache) -> Option<TimeSyncInfo> {
    use time_synchronization as ts;

    let features = lookup(cache, ROOT_ENDPOINT, ts::ID, FEATURE_MAP)?;
    Some(TimeSyncInfo {
        features: TimeSyncFeatures::from_bits_truncate(narrow(Some(features)).unwrap_or_default()),
        time_zone_list_max_size: narrow(lookup(
            cache,
            ROOT_ENDPOINT,
            ts::ID,
            ts::TIME_ZONE_LIST_MAX_SIZE,
        ))
        .unwrap_or_default(),
        dst_offset_list_max_size: narrow(lookup(
            cache,
            ROOT_ENDPOINT,
            ts::ID,
            ts::DST_OFFSET_LIST_MAX_SIZE,
        ))
        .unwrap_or_default(),
    })
}

fn parse_matching_fabric(
    cache: &Cache,
    identity: &FabricIdentity,
    errors: &mut Vec<CommissioningError>,
) -> Option<MatchingFabric> {
    use operational_credentials as oc;

    let fabrics = required(cache, oc::ID, oc::FABRICS, errors)?.as_list()?;
    fabrics.iter().find_map(|entry| {
        let root = entry.field(oc::FABRIC_ROOT_PUBLIC_KEY)?.as_bytes()?;
        let fabric_id = entry.field(oc::FABRIC_ID)?.as_u64().map(FabricId)?;
        if root != identity.root_public_key.as_slice() || fabric_id != identity.fabric_id {
            return None;
        }
        Some(MatchingFabric {
            node_id: NodeId(entry.field(oc::FABRIC_NODE_ID)?.as_u64()?),
            fabric_index: FabricIndex(narrow(entry.field(oc::FABRIC_INDEX))?),
        })
    })
}

fn parse_icd(cache: &Cache) -> Option<IcdInfo> {
    use icd_management as icd;

    let features = lookup(cache, ROOT_ENDPOINT, icd::ID, FEATURE_MAP)?;
    let get = |attr| lookup(cache, ROOT_ENDPOINT, icd::ID, attr);
    Some(IcdInfo {
        features: IcdFeatures::from_bits_truncate(narrow(Some(features)).unwrap_or_default()),
        idle_mode_duration_s: narrow(get(icd::IDLE_MODE_DURATION)).unwrap_or_default(),
        active_mode_duration_ms: narrow(get(icd::ACTIVE_MODE_DURATION)).unwrap_or_default(),
        active_mode_threshold_ms: narrow(get(icd::ACTIVE_MODE_THRESHOLD)).unwrap_or_default(),
        user_active_mode_trigger_hint: narrow(get(icd::USER_ACTIVE_MODE_TRIGGER_HINT))
            .unwrap_or_default(),
        is_lit: narrow::<u8>(get(icd::OPERATING_MODE)) == Some(1),
    })
}

/// Parse the accumulated read cache.
///
/// Every section is parsed even when an earlier one failed, so the returned
/// info is as complete as the device allowed. Errors are returned in section
/// order.
pub fn parse_commissioning_info(
    cache: &BTreeMap<ConcreteAttributePath, AttributeValue>,
    policy: &ReadPolicy,
    identity: Option<&FabricIdentity>,
) -> (ReadCommissioningInfo, Vec<CommissioningError>) {
    let mut errors = Vec::new();

    let mut info = ReadCommissioningInfo {
        basic: parse_basic(cache, &mut errors),
        general: parse_general(cache, &mut errors),
        network: parse_network(cache),
        ..Default::default()
    };
    if policy.time_sync {
        info.time = parse_time(cache);
    }
    if policy.fabric_match {
        match identity {
            Some(identity) => {
                info.matching_fabric = parse_matching_fabric(cache, identity, &mut errors);
            },
            None => errors.push(CommissioningError::IncorrectState("no fabric identity to match")),
        }
    }
    if policy.icd {
        info.icd = parse_icd(cache);
    }
    for wanted in &policy.extra {
        info.extra.extend(
            cache.iter().filter(|(path, _)| wanted.matches(path)).map(|(p, v)| (*p, v.clone())),
        );
    }

    debug!(
        endpoints = info.network.endpoints.len(),
        errors = errors.len(),
        "parsed commissioning info"
    );
    (info, errors)
}

#[cfg(test)]
mod tests {
    use commissioner_proto::CompressedFabricId;
    use proptest::prelude::*;

    use super::*;

    fn value(v: u64) -> AttributeValue {
        AttributeValue::Unsigned(v)
    }

    fn base_cache() -> Cache {
        let mut cache = Cache::new();
        let mut put = |ep, cluster, attr, v| {
            cache.insert(ConcreteAttributePath::new(ep, cluster, attr), v);
        };
        put(0, basic_information::ID, basic_information::VENDOR_ID, value(0xFFF1));
        put(0, basic_information::ID, basic_information::PRODUCT_ID, value(0x8001));
        put(0, general_commissioning::ID, general_commissioning::BREADCRUMB, value(0));
        put(
            0,
            general_commissioning::ID,
            general_commissioning::BASIC_COMMISSIONING_INFO,
            AttributeValue::Struct([(0, value(60)), (1, value(900))].into()),
        );
        put(0, general_commissioning::ID, general_commissioning::REGULATORY_CONFIG, value(0));
        put(0, general_commissioning::ID, general_commissioning::LOCATION_CAPABILITY, value(2));
        put(1, network_commissioning::ID, FEATURE_MAP, value(1));
        put(1, network_commissioning::ID, network_commissioning::CONNECT_MAX_TIME_SECONDS, value(20));
        cache
    }

    fn identity() -> FabricIdentity {
        FabricIdentity {
            fabric_index: FabricIndex(1),
            fabric_id: FabricId(0xFAB),
            node_id: NodeId(0x1),
            root_public_key: vec![0xAB; 32],
            compressed_fabric_id: CompressedFabricId(0xCF),
            vendor_id: VendorId(0xFFF1),
        }
    }

    #[test]
    fn batches_slice_in_order() {
        let policy = ReadPolicy { icd: true, ..Default::default() };
        let paths = policy.paths();
        assert_eq!(paths.len(), 17);

        let first = build_read_batch(&paths, 0, 9);
        assert!(first.exceeded);
        assert_eq!(first.paths, paths[..9]);

        let second = build_read_batch(&paths, 9, 9);
        assert!(!second.exceeded);
        assert_eq!(second.paths, paths[9..]);
    }

    #[test]
    fn exact_multiple_finishes_without_extra_request() {
        let paths = ReadPolicy::default().paths();
        let batch = build_read_batch(&paths, 0, paths.len());
        assert!(!batch.exceeded);
        assert_eq!(batch.paths.len(), paths.len());
    }

    #[test]
    fn parses_base_sections() {
        let (info, errors) = parse_commissioning_info(&base_cache(), &ReadPolicy::default(), None);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(info.basic.vendor_id, Some(VendorId(0xFFF1)));
        assert_eq!(info.general.recommended_fail_safe_seconds, 60);
        assert_eq!(info.general.location_capability, Some(RegulatoryLocation::IndoorOutdoor));

        let wifi = info.network.endpoint_for(NetworkCommissioningFeatures::WIFI).unwrap();
        assert_eq!((wifi.endpoint, wifi.connect_max_time_seconds), (1, Some(20)));
        assert!(!info.network.is_on_network());
    }

    #[test]
    fn missing_sections_accumulate_without_short_circuit() {
        let mut cache = base_cache();
        cache.remove(&ConcreteAttributePath::new(
            0,
            basic_information::ID,
            basic_information::VENDOR_ID,
        ));
        cache.remove(&ConcreteAttributePath::new(
            0,
            general_commissioning::ID,
            general_commissioning::BREADCRUMB,
        ));

        let (info, errors) = parse_commissioning_info(&cache, &ReadPolicy::default(), None);
        assert_eq!(errors.len(), 2);
        // Later sections still parsed
        assert_eq!(info.basic.product_id, Some(0x8001));
        assert_eq!(info.network.endpoints.len(), 1);
    }

    #[test]
    fn finds_matching_fabric() {
        use operational_credentials as oc;

        let mut cache = base_cache();
        let entry = |root: Vec<u8>, node: u64| {
            AttributeValue::Struct(
                [
                    (oc::FABRIC_ROOT_PUBLIC_KEY, AttributeValue::Bytes(root)),
                    (oc::FABRIC_ID, value(0xFAB)),
                    (oc::FABRIC_NODE_ID, value(node)),
                    (oc::FABRIC_INDEX, value(3)),
                ]
                .into(),
            )
        };
        cache.insert(
            ConcreteAttributePath::new(0, oc::ID, oc::FABRICS),
            AttributeValue::List(vec![entry(vec![0x11; 32], 0x99), entry(vec![0xAB; 32], 0x42)]),
        );

        let policy = ReadPolicy { fabric_match: true, ..Default::default() };
        let (info, errors) = parse_commissioning_info(&cache, &policy, Some(&identity()));
        assert!(errors.is_empty());
        assert_eq!(
            info.matching_fabric,
            Some(MatchingFabric { node_id: NodeId(0x42), fabric_index: FabricIndex(3) })
        );
    }

    #[test]
    fn icd_section_absent_on_non_icd() {
        let policy = ReadPolicy { icd: true, time_sync: true, ..Default::default() };
        let (info, errors) = parse_commissioning_info(&base_cache(), &policy, None);
        assert!(errors.is_empty());
        assert!(info.icd.is_none());
        assert!(info.time.is_none());
    }

    proptest! {
        #[test]
        fn requests_cover_policy_exactly(
            time_sync: bool,
            network_scan: bool,
            fabric_match: bool,
            icd: bool,
            extra in 0usize..12,
            capacity in 1usize..16,
        ) {
            let policy = ReadPolicy {
                time_sync,
                network_scan,
                fabric_match,
                icd,
                extra: (0..extra)
                    .map(|i| AttributePath::new(1, 0x0006, u32::try_from(i).unwrap()))
                    .collect(),
            };
            let paths = policy.paths();

            let mut consumed = 0;
            let mut requests = 0;
            let mut seen = Vec::new();
            loop {
                let batch = build_read_batch(&paths, consumed, capacity);
                requests += 1;
                prop_assert!(batch.paths.len() <= capacity);
                prop_assert_eq!(&batch.paths[..], &paths[consumed..consumed + batch.paths.len()]);
                consumed += batch.paths.len();
                seen.extend(batch.paths);
                if !batch.exceeded {
                    break;
                }
            }

            prop_assert_eq!(requests, paths.len().div_ceil(capacity));
            prop_assert_eq!(seen, paths);
        }
    }
}
