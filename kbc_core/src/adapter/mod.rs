//! Council source adapters.
//!
//! Every council exposes the same logical data behind a different protocol,
//! so each adapter owns its own network or browser dance and hands back
//! normalized [`ScheduleEntry`] values. The registry is built once at process
//! start and only read afterwards.

pub mod maidstone;
pub mod tonbridge_malling;
pub mod tunbridge_wells;

pub use maidstone::Maidstone;
pub use tonbridge_malling::TonbridgeMalling;
pub use tunbridge_wells::TunbridgeWells;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::schedule::{PropertyAddress, ScheduleEntry, SourceInfo};

/// Optional capability: enumerate candidate addresses for a postcode.
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn lookup_addresses(&self, postcode: &str)
        -> Result<Vec<PropertyAddress>, AdapterError>;
}

/// A source of bin-collection schedules.
///
/// Returned entries already carry canonical dates; rows whose date could not
/// be normalized never leave the adapter. Adapters must not retry internally.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    async fn fetch_schedule(
        &self,
        postcode: &str,
        property: &str,
    ) -> Result<Vec<ScheduleEntry>, AdapterError>;

    /// Sources that can resolve a postcode to addresses expose it here.
    fn address_lookup(&self) -> Option<&dyn AddressLookup> {
        None
    }
}

/// Endpoint configuration shared by the registry's adapters.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// WebDriver endpoint used by browser-driven sources.
    pub webdriver_url: String,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
        }
    }
}

/// The fixed id-to-adapter mapping, built once at startup.
pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Register the production adapters.
    pub fn new(config: &AdapterConfig) -> Self {
        Self::from_adapters(vec![
            Arc::new(TunbridgeWells::new()),
            Arc::new(TonbridgeMalling::new()),
            Arc::new(Maidstone::new(&config.webdriver_url)),
        ])
    }

    /// Build a registry from arbitrary adapters (tests substitute stubs).
    pub fn from_adapters(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.id(), adapter))
                .collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters.get(id).cloned()
    }

    /// All registered sources, in stable id order.
    pub fn list(&self) -> Vec<SourceInfo> {
        let mut sources: Vec<SourceInfo> = self
            .adapters
            .values()
            .map(|adapter| SourceInfo {
                id: adapter.id(),
                name: adapter.name(),
            })
            .collect();
        sources.sort_by_key(|source| source.id);
        sources
    }
}
