//! Typed operations over a [`Connection`]: list, add, and delete static DNS
//! records. No client-side caching - every call hits the device.

use crate::codec::to_attribute_words;
use crate::connection::{Connection, ConnectionConfig};
use crate::errors::Result;
use crate::record::DnsRecord;
use async_trait::async_trait;

/// Device operations a [`crate::provider::Provider`] needs. Pulled out as a
/// trait so tests can substitute a mock device without a real socket.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    async fn list_records(&self) -> Result<Vec<DnsRecord>>;
    async fn add_record(&self, record: &DnsRecord) -> Result<()>;
    async fn delete_record(&self, record: &DnsRecord) -> Result<()>;
}

/// Thin façade translating device operations into wire sentences.
pub struct Client {
    connection: Connection,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Self {
        Client { connection: Connection::new(config) }
    }
}

#[async_trait]
impl DeviceClient for Client {
    /// Lists every static DNS record currently on the device.
    async fn list_records(&self) -> Result<Vec<DnsRecord>> {
        let response = self
            .connection
            .send(vec!["/ip/dns/static/print".to_string(), "=detail=".to_string()])
            .await?;
        response.raise_for_error()?;
        Ok(response
            .get_re_sentences()
            .into_iter()
            .map(|sentence| DnsRecord::from_attributes(&sentence.attributes, &sentence.api_attributes))
            .collect())
    }

    /// Adds a static DNS record to the device.
    async fn add_record(&self, record: &DnsRecord) -> Result<()> {
        let mut words = vec!["/ip/dns/static/add".to_string()];
        words.extend(record.to_attribute_words());
        let response = self.connection.send(words).await?;
        response.raise_for_error()?;
        Ok(())
    }

    /// Deletes a static DNS record by its device id.
    async fn delete_record(&self, record: &DnsRecord) -> Result<()> {
        let id = record.common().id.clone().unwrap_or_default();
        let words = vec!["/ip/dns/static/remove".to_string()]
            .into_iter()
            .chain(to_attribute_words(vec![("numbers", Some(id.as_str()))]))
            .collect();
        let response = self.connection.send(words).await?;
        response.raise_for_error()?;
        Ok(())
    }
}
