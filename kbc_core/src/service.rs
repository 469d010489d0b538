//! Orchestration of registry, cache and adapters.
//!
//! The service owns no state of its own: the registry is read-only after
//! startup and the cache is externally stored, so any number of concurrent
//! requests can share one instance.

use std::sync::Arc;

use crate::adapter::{AdapterRegistry, SourceAdapter};
use crate::cache::ScheduleCache;
use crate::error::ServiceError;
use crate::schedule::{PropertyAddress, ScheduleEntry, SourceInfo};

/// A resolved schedule plus whether it came from cache.
#[derive(Debug)]
pub struct ScheduleResult {
    pub entries: Vec<ScheduleEntry>,
    pub cached: bool,
}

pub struct ScheduleService {
    registry: AdapterRegistry,
    cache: ScheduleCache,
}

impl ScheduleService {
    pub fn new(registry: AdapterRegistry, cache: ScheduleCache) -> Self {
        Self { registry, cache }
    }

    pub fn sources(&self) -> Vec<SourceInfo> {
        self.registry.list()
    }

    fn adapter(&self, source: &str) -> Result<Arc<dyn SourceAdapter>, ServiceError> {
        self.registry
            .get(source)
            .ok_or_else(|| ServiceError::UnknownSource(source.to_string()))
    }

    /// Resolve the schedule for one property, from cache when fresh.
    ///
    /// Entries are sorted by date then type so identical source data always
    /// produces an identical list, however the adapter happened to order it.
    pub async fn get_schedule(
        &self,
        source: &str,
        postcode: &str,
        property: &str,
    ) -> Result<ScheduleResult, ServiceError> {
        let adapter = self.adapter(source)?;
        if let Some(entries) = self.cache.get(source, property).await {
            tracing::debug!(source, property, "serving schedule from cache");
            return Ok(ScheduleResult {
                entries,
                cached: true,
            });
        }
        tracing::debug!(source, property, "fetching schedule from council");
        let mut entries = adapter.fetch_schedule(postcode, property).await?;
        entries.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.collection_type.cmp(&b.collection_type))
        });
        self.cache.put(source, property, &entries).await;
        Ok(ScheduleResult {
            entries,
            cached: false,
        })
    }

    pub async fn lookup_addresses(
        &self,
        source: &str,
        postcode: &str,
    ) -> Result<Vec<PropertyAddress>, ServiceError> {
        let adapter = self.adapter(source)?;
        let Some(lookup) = adapter.address_lookup() else {
            return Err(ServiceError::UnsupportedLookup(source.to_string()));
        };
        Ok(lookup.lookup_addresses(postcode).await?)
    }
}
