//! Conversion between external-dns [`Endpoint`]s and device [`DnsRecord`]s,
//! including TTL encoding and the record-map used for apply-time lookups.

use crate::endpoint::{Endpoint, RecordType};
use crate::errors::UnsupportedRecordType;
use crate::record::{DnsRecord, RecordCommon};
use std::collections::HashMap;

const SECONDS_PER_WEEK: u64 = 604_800;
const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_HOUR: u64 = 3_600;
const SECONDS_PER_MINUTE: u64 = 60;

/// The TTL external-dns assumes when an endpoint omits `recordTTL`.
pub const DEFAULT_TTL_SECONDS: u64 = SECONDS_PER_DAY;

/// Encodes a number of seconds as the device's `WwDdHhMmSs` TTL string,
/// always emitting all five segments even when zero.
pub fn encode_ttl(seconds: u64) -> String {
    let weeks = seconds / SECONDS_PER_WEEK;
    let rem = seconds % SECONDS_PER_WEEK;
    let days = rem / SECONDS_PER_DAY;
    let rem = rem % SECONDS_PER_DAY;
    let hours = rem / SECONDS_PER_HOUR;
    let rem = rem % SECONDS_PER_HOUR;
    let minutes = rem / SECONDS_PER_MINUTE;
    let secs = rem % SECONDS_PER_MINUTE;
    format!("{}w{}d{}h{}m{}s", weeks, days, hours, minutes, secs)
}

/// Decodes a device TTL string back to a number of seconds. Segments are
/// matched greedily in `w d h m s` order; any missing segment is zero.
pub fn decode_ttl(ttl: &str) -> u64 {
    let mut total = 0u64;
    let mut number = String::new();
    for ch in ttl.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let value: u64 = number.parse().unwrap_or(0);
        number.clear();
        total += match ch {
            'w' => value * SECONDS_PER_WEEK,
            'd' => value * SECONDS_PER_DAY,
            'h' => value * SECONDS_PER_HOUR,
            'm' => value * SECONDS_PER_MINUTE,
            's' => value,
            _ => 0,
        };
    }
    total
}

/// Converts one endpoint target into a device record. Only `A`, `CNAME`,
/// and `TXT` are supported; anything else is an error the caller logs and
/// skips.
pub fn to_device_record(endpoint: &Endpoint, target: &str) -> Result<DnsRecord, UnsupportedRecordType> {
    let common = RecordCommon {
        disabled: false,
        id: None,
        match_subdomain: target.starts_with("*."),
        name: endpoint.dns_name.clone(),
        ttl: encode_ttl(endpoint.record_ttl.unwrap_or(DEFAULT_TTL_SECONDS)),
    };
    match endpoint.record_type {
        RecordType::A => Ok(DnsRecord::A { common, address: target.to_string() }),
        RecordType::Cname => Ok(DnsRecord::Cname { common, cname: target.to_string() }),
        RecordType::Txt => Ok(DnsRecord::Txt { common, text: target.to_string() }),
        other => Err(UnsupportedRecordType(other)),
    }
}

/// Converts a device record into its endpoint form. Returns `None` for
/// types other than `A`/`CNAME`/`TXT` - such records are dropped silently
/// from listings, per the translation layer's scope.
pub fn to_endpoint(record: &DnsRecord) -> Option<Endpoint> {
    let (record_type, target) = match record {
        DnsRecord::A { address, .. } => (RecordType::A, address.clone()),
        DnsRecord::Cname { cname, .. } => (RecordType::Cname, cname.clone()),
        DnsRecord::Txt { text, .. } => (RecordType::Txt, text.clone()),
        _ => return None,
    };
    let common = record.common();
    Some(Endpoint {
        dns_name: common.name.clone(),
        targets: vec![target],
        record_type,
        set_identifier: None,
        record_ttl: Some(decode_ttl(&common.ttl)),
        labels: Some(HashMap::new()),
        provider_specific: Some(Vec::new()),
    })
}

/// Groups device records by name for O(targets) lookup during
/// `apply_changes`.
pub struct RecordMap {
    by_name: HashMap<String, Vec<DnsRecord>>,
}

impl RecordMap {
    pub fn new(records: Vec<DnsRecord>) -> Self {
        let mut by_name: HashMap<String, Vec<DnsRecord>> = HashMap::new();
        for record in records {
            by_name.entry(record.common().name.clone()).or_default().push(record);
        }
        RecordMap { by_name }
    }

    /// Finds the device record matching `endpoint`'s name whose
    /// variant-specific payload equals `target`. Only `A`/`CNAME`/`TXT`
    /// variants participate in the match.
    pub fn find(&self, endpoint: &Endpoint, target: &str) -> Option<&DnsRecord> {
        self.by_name.get(&endpoint.dns_name)?.iter().find(|record| match record {
            DnsRecord::A { address, .. } => address == target,
            DnsRecord::Cname { cname, .. } => cname == target,
            DnsRecord::Txt { text, .. } => text == target,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ttl_round_trips_documented_examples() {
        for &(seconds, expected) in &[
            (0u64, "0w0d0h0m0s"),
            (694861, "1w1d1h1m1s"),
            (86400, "0w1d0h0m0s"),
            (59, "0w0d0h0m59s"),
        ] {
            let encoded = encode_ttl(seconds);
            assert_eq!(encoded, expected);
            assert_eq!(decode_ttl(&encoded), seconds);
        }
    }

    #[test]
    fn endpoint_to_device_record_sets_wildcard_match_subdomain() {
        let endpoint = Endpoint {
            dns_name: "apps.lan".to_string(),
            targets: vec!["*.apps.lan".to_string()],
            record_type: RecordType::Cname,
            set_identifier: None,
            record_ttl: None,
            labels: None,
            provider_specific: None,
        };
        let record = to_device_record(&endpoint, "*.apps.lan").unwrap();
        assert!(record.common().match_subdomain);
        assert_eq!(record.common().ttl, encode_ttl(DEFAULT_TTL_SECONDS));
        match record {
            DnsRecord::Cname { cname, .. } => assert_eq!(cname, "*.apps.lan"),
            other => panic!("expected Cname, got {:?}", other),
        }
    }

    #[test]
    fn unsupported_record_type_is_an_error() {
        let endpoint = Endpoint {
            dns_name: "svc.lan".to_string(),
            targets: vec!["10 1".to_string()],
            record_type: RecordType::Srv,
            set_identifier: None,
            record_ttl: None,
            labels: None,
            provider_specific: None,
        };
        assert!(to_device_record(&endpoint, "10 1").is_err());
    }

    #[test]
    fn unsupported_device_type_is_dropped_from_listing() {
        let common = RecordCommon {
            disabled: false,
            id: Some("*1".to_string()),
            match_subdomain: false,
            name: "svc.lan".to_string(),
            ttl: "0w0d1h0m0s".to_string(),
        };
        let record = DnsRecord::Srv {
            common,
            srv_port: 443,
            srv_priority: 10,
            srv_target: "svc.lan".to_string(),
            srv_weight: 5,
        };
        assert!(to_endpoint(&record).is_none());
    }

    #[test]
    fn record_map_finds_matching_address() {
        let common = |name: &str| RecordCommon {
            disabled: false,
            id: Some(format!("*{}", name)),
            match_subdomain: false,
            name: name.to_string(),
            ttl: "0w0d1h0m0s".to_string(),
        };
        let records = vec![
            DnsRecord::A { common: common("x"), address: "10.0.0.5".to_string() },
            DnsRecord::A { common: common("x"), address: "10.0.0.6".to_string() },
        ];
        let map = RecordMap::new(records);
        let endpoint = Endpoint {
            dns_name: "x".to_string(),
            targets: vec![],
            record_type: RecordType::A,
            set_identifier: None,
            record_ttl: None,
            labels: None,
            provider_specific: None,
        };
        assert!(map.find(&endpoint, "10.0.0.5").is_some());
        assert!(map.find(&endpoint, "10.0.0.9").is_none());
    }
}
