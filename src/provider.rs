//! Reconciliation: converts the controller's change batches into device
//! calls, and answers the controller's listing/filter queries.

use crate::client::{Client, DeviceClient};
use crate::endpoint::{Changes, DomainFilter, Endpoint};
use crate::errors::Result;
use crate::translate::{to_device_record, to_endpoint, RecordMap};
use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;

/// Domain filter with its regex fields pre-compiled. Compiled but, per the
/// upstream contract, never applied here - the controller pre-scopes calls
/// using the filter this provider reports via `get_domain_filter`.
pub struct CompiledDomainFilter {
    pub filter: DomainFilter,
    pub regex_include: Option<Regex>,
    pub regex_exclude: Option<Regex>,
}

impl CompiledDomainFilter {
    pub fn new(filter: DomainFilter) -> Self {
        let regex_include = filter.regex_include.as_deref().and_then(|p| Regex::new(p).ok());
        let regex_exclude = filter.regex_exclude.as_deref().and_then(|p| Regex::new(p).ok());
        CompiledDomainFilter { filter, regex_include, regex_exclude }
    }
}

/// Bridges external-dns's reconciliation model to a RouterOS [`Client`].
pub struct Provider {
    client: Client,
    domain_filter: CompiledDomainFilter,
}

impl Provider {
    pub fn new(client: Client, domain_filter: DomainFilter) -> Self {
        Provider { client, domain_filter: CompiledDomainFilter::new(domain_filter) }
    }

    /// Returns the configured filter verbatim; the controller uses it to
    /// pre-scope which records it asks this provider about.
    pub async fn get_domain_filter(&self) -> DomainFilter {
        info!("get domain filter called");
        self.domain_filter.filter.clone()
    }

    /// Identity pass-through, reserved for device-specific normalization.
    pub async fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        info!("adjust endpoints called with {} endpoints", endpoints.len());
        endpoints
    }

    /// Lists device records, translating supported variants and dropping
    /// the rest.
    pub async fn list_records(&self) -> Result<Vec<Endpoint>> {
        info!("list records called");
        let records = self.client.list_records().await?;
        Ok(records.iter().filter_map(to_endpoint).collect())
    }

    /// Applies a batch of changes in the order creates, deletes, updates;
    /// per-operation failures are logged and do not abort the batch, matching
    /// the controller's best-effort expectations.
    pub async fn apply_changes(&self, changes: Changes) -> Result<()> {
        let creates = changes.create.unwrap_or_default();
        let update_olds = changes.update_old.unwrap_or_default();
        let update_news = changes.update_new.unwrap_or_default();
        let deletes = changes.delete.unwrap_or_default();
        let updates: Vec<(&Endpoint, &Endpoint)> = update_olds.iter().zip(update_news.iter()).collect();

        info!(
            "apply changes called with {} creates, {} deletes, {} updates",
            creates.len(),
            deletes.len(),
            updates.len()
        );

        let records = self.client.list_records().await?;
        debug!("listed {} records from device", records.len());
        let record_map = RecordMap::new(records);

        for endpoint in &creates {
            for target in &endpoint.targets {
                self.create(endpoint, target).await;
            }
        }

        for endpoint in &deletes {
            for target in &endpoint.targets {
                self.delete(endpoint, target, &record_map).await;
            }
        }

        for (old_endpoint, endpoint) in updates {
            let old_targets: HashSet<&String> = old_endpoint.targets.iter().collect();
            let new_targets: HashSet<&String> = endpoint.targets.iter().collect();

            for target in old_targets.difference(&new_targets) {
                self.delete(endpoint, target, &record_map).await;
            }
            for target in new_targets.difference(&old_targets) {
                self.create(endpoint, target).await;
            }
        }

        Ok(())
    }

    async fn create(&self, endpoint: &Endpoint, target: &str) {
        debug!("create record: {:?} {} {}", endpoint.record_type, endpoint.dns_name, target);
        let record = match to_device_record(endpoint, target) {
            Ok(record) => record,
            Err(e) => {
                warn!("create record: {:?} {} {}: {}", endpoint.record_type, endpoint.dns_name, target, e);
                return;
            }
        };
        if let Err(e) = self.client.add_record(&record).await {
            warn!("create record: {:?} {} {}: {}", endpoint.record_type, endpoint.dns_name, target, e);
        }
    }

    async fn delete(&self, endpoint: &Endpoint, target: &str, record_map: &RecordMap) {
        debug!("delete record: {:?} {} {}", endpoint.record_type, endpoint.dns_name, target);
        let record = match record_map.find(endpoint, target) {
            Some(record) => record,
            None => {
                debug!("device record not found");
                return;
            }
        };
        if let Err(e) = self.client.delete_record(record).await {
            warn!("delete record: {:?} {} {}: {}", endpoint.record_type, endpoint.dns_name, target, e);
        }
    }
}
