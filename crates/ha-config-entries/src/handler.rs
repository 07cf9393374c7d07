//! Integration and platform hooks
//!
//! Integrations register an [`IntegrationHandler`] for their domain so the
//! manager can set up and unload their entries. Entity platforms of an
//! integration (climate, sensor, ...) register a [`PlatformHandler`] and are
//! reached through [`ConfigEntries::async_forward_entry_setups`] and
//! [`ConfigEntries::async_unload_platforms`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::entry::ConfigEntry;
use crate::manager::ConfigEntries;

/// Entry-level hooks of an integration
///
/// Both hooks receive the manager so the integration can call back into the
/// host (update entry data, forward platforms). They report plain success:
/// an integration is expected to log its own failure cause.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    /// Set up an entry. Returns false if the integration could not start.
    async fn async_setup_entry(&self, entries: Arc<ConfigEntries>, entry: ConfigEntry) -> bool;

    /// Unload an entry. Returns false if the entry stays active.
    async fn async_unload_entry(&self, entries: Arc<ConfigEntries>, entry: ConfigEntry) -> bool;
}

/// Entity platform hooks for one `(domain, platform)` pair
#[async_trait]
pub trait PlatformHandler: Send + Sync {
    /// Create the platform's entities for an entry
    async fn async_setup_entry(&self, entry: &ConfigEntry) -> Result<(), String>;

    /// Remove the platform's entities. Returns false if they could not be removed.
    async fn async_unload_entry(&self, entry: &ConfigEntry) -> bool;
}
