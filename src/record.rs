//! The device's static DNS record model: a tagged variant keyed on `type`,
//! serialized to and from RouterOS API attribute words.

use std::collections::HashMap;

/// Fields shared by every record variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCommon {
    pub disabled: bool,
    /// The device's opaque id, carried verbatim with its `*` prefix.
    /// `None` for a record not yet created on the device.
    pub id: Option<String>,
    pub match_subdomain: bool,
    pub name: String,
    /// `WwDdHhMmSs` device TTL format; see [`crate::translate::encode_ttl`].
    pub ttl: String,
}

/// A static DNS record as stored on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRecord {
    A { common: RecordCommon, address: String },
    Aaaa { common: RecordCommon, address: String },
    Cname { common: RecordCommon, cname: String },
    Fwd { common: RecordCommon, forward_to: String },
    Mx { common: RecordCommon, mx_preference: i64, mx_exchange: String },
    Ns { common: RecordCommon, ns: String },
    Nxdomain { common: RecordCommon },
    Srv { common: RecordCommon, srv_port: i64, srv_priority: i64, srv_target: String, srv_weight: i64 },
    Txt { common: RecordCommon, text: String },
}

impl DnsRecord {
    pub fn common(&self) -> &RecordCommon {
        match self {
            DnsRecord::A { common, .. }
            | DnsRecord::Aaaa { common, .. }
            | DnsRecord::Cname { common, .. }
            | DnsRecord::Fwd { common, .. }
            | DnsRecord::Mx { common, .. }
            | DnsRecord::Ns { common, .. }
            | DnsRecord::Nxdomain { common }
            | DnsRecord::Srv { common, .. }
            | DnsRecord::Txt { common, .. } => common,
        }
    }

    pub fn device_type(&self) -> &'static str {
        match self {
            DnsRecord::A { .. } => "A",
            DnsRecord::Aaaa { .. } => "AAAA",
            DnsRecord::Cname { .. } => "CNAME",
            DnsRecord::Fwd { .. } => "FWD",
            DnsRecord::Mx { .. } => "MX",
            DnsRecord::Ns { .. } => "NS",
            DnsRecord::Nxdomain { .. } => "NXDOMAIN",
            DnsRecord::Srv { .. } => "SRV",
            DnsRecord::Txt { .. } => "TXT",
        }
    }

    /// Serializes this record to `=key=value` attribute words for
    /// `/ip/dns/static/add`. The `id` is never included - the device
    /// assigns it.
    pub fn to_attribute_words(&self) -> Vec<String> {
        let common = self.common();
        let mut words = vec![
            format!("=disabled={}", crate::codec::bool_word_value(common.disabled)),
            format!("=match-subdomain={}", crate::codec::bool_word_value(common.match_subdomain)),
            format!("=name={}", common.name),
            format!("=ttl={}", common.ttl),
        ];
        match self {
            DnsRecord::A { address, .. } | DnsRecord::Aaaa { address, .. } => {
                words.push(format!("=address={}", address));
            }
            DnsRecord::Cname { cname, .. } => words.push(format!("=cname={}", cname)),
            DnsRecord::Fwd { forward_to, .. } => words.push(format!("=forward-to={}", forward_to)),
            DnsRecord::Mx { mx_preference, mx_exchange, .. } => {
                words.push(format!("=mx-preference={}", mx_preference));
                words.push(format!("=mx-exchange={}", mx_exchange));
            }
            DnsRecord::Ns { ns, .. } => words.push(format!("=ns={}", ns)),
            DnsRecord::Nxdomain { .. } => {}
            DnsRecord::Srv { srv_port, srv_priority, srv_target, srv_weight, .. } => {
                words.push(format!("=srv-port={}", srv_port));
                words.push(format!("=srv-priority={}", srv_priority));
                words.push(format!("=srv-target={}", srv_target));
                words.push(format!("=srv-weight={}", srv_weight));
            }
            DnsRecord::Txt { text, .. } => words.push(format!("=text={}", text)),
        }
        words.push(format!("=type={}", self.device_type()));
        words
    }

    /// Parses one `!re` sentence's attributes (and its `.id` api-attribute)
    /// into a record. A missing `type` attribute defaults to `A`, matching
    /// legacy rows the device may return.
    pub fn from_attributes(
        attributes: &HashMap<String, String>,
        api_attributes: &HashMap<String, String>,
    ) -> DnsRecord {
        let get = |key: &str| attributes.get(key).cloned().unwrap_or_default();
        let get_int = |key: &str| -> i64 { get(key).parse().unwrap_or(0) };

        let common = RecordCommon {
            disabled: get("disabled") == "true",
            id: api_attributes.get(".id").cloned(),
            match_subdomain: get("match-subdomain") == "true",
            name: get("name"),
            ttl: get("ttl"),
        };

        let record_type = attributes.get("type").map(String::as_str).unwrap_or("A");
        match record_type {
            "A" => DnsRecord::A { common, address: get("address") },
            "AAAA" => DnsRecord::Aaaa { common, address: get("address") },
            "CNAME" => DnsRecord::Cname { common, cname: get("cname") },
            "FWD" => DnsRecord::Fwd { common, forward_to: get("forward-to") },
            "MX" => DnsRecord::Mx {
                common,
                mx_preference: get_int("mx-preference"),
                mx_exchange: get("mx-exchange"),
            },
            "NS" => DnsRecord::Ns { common, ns: get("ns") },
            "NXDOMAIN" => DnsRecord::Nxdomain { common },
            "SRV" => DnsRecord::Srv {
                common,
                srv_port: get_int("srv-port"),
                srv_priority: get_int("srv-priority"),
                srv_target: get("srv-target"),
                srv_weight: get_int("srv-weight"),
            },
            "TXT" => DnsRecord::Txt { common, text: get("text") },
            // Devices are documented to only emit the types above; an
            // unrecognized type is treated like NXDOMAIN (no payload) so a
            // single odd row can't fail the whole listing.
            _ => DnsRecord::Nxdomain { common },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn common() -> RecordCommon {
        RecordCommon {
            disabled: false,
            id: None,
            match_subdomain: false,
            name: "svc.lan".to_string(),
            ttl: "0w0d1h0m0s".to_string(),
        }
    }

    #[test]
    fn a_record_serializes_expected_words() {
        let record = DnsRecord::A { common: common(), address: "10.0.0.5".to_string() };
        let words = record.to_attribute_words();
        assert!(words.contains(&"=name=svc.lan".to_string()));
        assert!(words.contains(&"=address=10.0.0.5".to_string()));
        assert!(words.contains(&"=type=A".to_string()));
        assert!(words.contains(&"=disabled=false".to_string()));
        assert!(words.contains(&"=match-subdomain=false".to_string()));
    }

    #[test]
    fn missing_type_attribute_defaults_to_a() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), "svc.lan".to_string());
        attrs.insert("address".to_string(), "10.0.0.5".to_string());
        let record = DnsRecord::from_attributes(&attrs, &HashMap::new());
        assert!(matches!(record, DnsRecord::A { .. }));
    }

    #[test]
    fn id_is_read_from_api_attributes_with_prefix() {
        let mut attrs = HashMap::new();
        attrs.insert("type".to_string(), "CNAME".to_string());
        attrs.insert("cname".to_string(), "target.lan".to_string());
        let mut api_attrs = HashMap::new();
        api_attrs.insert(".id".to_string(), "*1A".to_string());
        let record = DnsRecord::from_attributes(&attrs, &api_attrs);
        assert_eq!(record.common().id.as_deref(), Some("*1A"));
    }

    #[test]
    fn srv_record_round_trips_numeric_fields() {
        let mut attrs = HashMap::new();
        attrs.insert("type".to_string(), "SRV".to_string());
        attrs.insert("srv-port".to_string(), "443".to_string());
        attrs.insert("srv-priority".to_string(), "10".to_string());
        attrs.insert("srv-target".to_string(), "svc.lan".to_string());
        attrs.insert("srv-weight".to_string(), "5".to_string());
        let record = DnsRecord::from_attributes(&attrs, &HashMap::new());
        match record {
            DnsRecord::Srv { srv_port, srv_priority, srv_target, srv_weight, .. } => {
                assert_eq!(srv_port, 443);
                assert_eq!(srv_priority, 10);
                assert_eq!(srv_target, "svc.lan");
                assert_eq!(srv_weight, 5);
            }
            other => panic!("expected Srv, got {:?}", other),
        }
    }
}
