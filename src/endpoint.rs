//! The controller-side data model: the JSON shapes external-dns exchanges
//! with a webhook provider over HTTP.
//!
//! Reference: <https://github.com/kubernetes-sigs/external-dns/blob/master/endpoint/endpoint.go>
//! and <https://github.com/kubernetes-sigs/external-dns/blob/master/plan/plan.go>

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record types external-dns can hand to a provider. Only `A`, `Cname`, and
/// `Txt` round-trip through the device translation layer; the rest are
/// accepted on the wire but rejected by [`crate::translate::to_device_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    #[serde(rename = "AAAA")]
    Aaaa,
    #[serde(rename = "CNAME")]
    Cname,
    #[serde(rename = "TXT")]
    Txt,
    #[serde(rename = "SRV")]
    Srv,
    #[serde(rename = "NS")]
    Ns,
    #[serde(rename = "PTR")]
    Ptr,
    #[serde(rename = "MX")]
    Mx,
    #[serde(rename = "NAPTR")]
    Naptr,
}

/// One entry of provider-specific metadata attached to an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificItem {
    pub name: String,
    pub value: String,
}

/// A DNS record as known to external-dns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(rename = "dnsName")]
    pub dns_name: String,
    pub targets: Vec<String>,
    #[serde(rename = "recordType")]
    pub record_type: RecordType,
    #[serde(rename = "setIdentifier", skip_serializing_if = "Option::is_none", default)]
    pub set_identifier: Option<String>,
    #[serde(rename = "recordTTL", skip_serializing_if = "Option::is_none", default)]
    pub record_ttl: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub labels: Option<HashMap<String, String>>,
    #[serde(rename = "providerSpecific", skip_serializing_if = "Option::is_none", default)]
    pub provider_specific: Option<Vec<ProviderSpecificItem>>,
}

/// A set of rules external-dns uses to include/exclude DNS records for
/// processing. Crosses the HTTP boundary as source strings; the regex
/// fields are compiled locally by [`crate::provider::Provider`] for
/// potential future use but are not applied to `list_records` or
/// `apply_changes` - the controller pre-filters.
///
/// Reference: <https://github.com/kubernetes-sigs/external-dns/blob/master/endpoint/domain_filter.go#L56>
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub include: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exclude: Option<Vec<String>>,
    #[serde(rename = "regexInclude", skip_serializing_if = "Option::is_none", default)]
    pub regex_include: Option<String>,
    #[serde(rename = "regexExclude", skip_serializing_if = "Option::is_none", default)]
    pub regex_exclude: Option<String>,
}

/// A batch of changes external-dns asks the provider to reconcile.
/// `update_old`/`update_new` are paired positionally: index `i` of one
/// describes the prior state of the same logical record as index `i` of
/// the other.
///
/// Reference: <https://github.com/kubernetes-sigs/external-dns/blob/master/plan/plan.go#L34>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Changes {
    #[serde(rename = "Create", skip_serializing_if = "Option::is_none", default)]
    pub create: Option<Vec<Endpoint>>,
    #[serde(rename = "UpdateOld", skip_serializing_if = "Option::is_none", default)]
    pub update_old: Option<Vec<Endpoint>>,
    #[serde(rename = "UpdateNew", skip_serializing_if = "Option::is_none", default)]
    pub update_new: Option<Vec<Endpoint>>,
    #[serde(rename = "Delete", skip_serializing_if = "Option::is_none", default)]
    pub delete: Option<Vec<Endpoint>>,
}
