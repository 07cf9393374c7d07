//! Config Entries Manager
//!
//! Stores entries, persists them, and drives integration setup/unload.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::handler::{IntegrationHandler, PlatformHandler};
use crate::state_machine::InvalidTransition;
use crate::storage::{EntryStore, StorageFile, StorageResult};

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed for entry {0}")]
    SetupFailed(String),

    #[error("Unload failed for entry {0}")]
    UnloadFailed(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

/// Config Entries Manager
///
/// Owns every config entry and is the host API integrations talk to:
/// - entry creation, update and removal, persisted on every change
/// - setup/unload/reload through the domain's [`IntegrationHandler`]
/// - forwarding an entry to its entity platforms and tearing them down
pub struct ConfigEntries {
    store: EntryStore,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Serializes setup/unload transitions
    setup_lock: Mutex<()>,

    /// Serializes snapshot + write of the storage file
    save_lock: Mutex<()>,

    /// Integration hooks by domain
    integrations: DashMap<String, Arc<dyn IntegrationHandler>>,

    /// Platform hooks by (domain, platform)
    platforms: DashMap<(String, String), Arc<dyn PlatformHandler>>,

    /// entry_id -> platforms currently set up for it
    loaded_platforms: DashMap<String, HashSet<String>>,
}

impl ConfigEntries {
    /// Create a new config entries manager
    pub fn new(store: EntryStore) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
            integrations: DashMap::new(),
            platforms: DashMap::new(),
            loaded_platforms: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> StorageResult<()> {
        if let Some(storage_file) = self.store.load::<ConfigEntriesData>(STORAGE_KEY).await? {
            info!(
                "Loading {} config entries from storage (v{}.{})",
                storage_file.data.entries.len(),
                storage_file.version,
                storage_file.minor_version
            );

            for entry in storage_file.data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    ///
    /// Saves run one at a time and each snapshots the entries only once it
    /// holds the lock, so the file always ends up with the latest state.
    pub async fn save(&self) -> StorageResult<()> {
        let _lock = self.save_lock.lock().await;

        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };
        let storage_file =
            StorageFile::new(STORAGE_KEY, data, STORAGE_VERSION, STORAGE_MINOR_VERSION);

        self.store.save(&storage_file).await?;
        debug!("Saved {} config entries to storage", self.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids: Vec<String> = self
            .by_domain
            .get(domain)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .map(|r| r.value().clone())?;
        self.get(&entry_id)
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Update an existing entry and persist it
    ///
    /// Runtime state (`state`, `reason`) is left untouched, so this is safe
    /// to call from inside an integration's setup hook.
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if update.is_empty() {
            return Ok(entry);
        }

        self.unindex_entry(&entry);

        let mut updated = entry;
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(data) = update.data {
            updated.data = data;
        }
        updated.modified_at = Utc::now();

        self.index_entry(&updated);
        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        self.unindex_entry(&entry);
        self.loaded_platforms.remove(entry_id);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    fn set_state(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register the entry hooks for a domain
    pub fn register_integration(&self, domain: &str, handler: Arc<dyn IntegrationHandler>) {
        self.integrations.insert(domain.to_string(), handler);
        debug!("Registered integration handler for domain: {}", domain);
    }

    /// Register the hooks for one entity platform of a domain
    pub fn register_platform(
        &self,
        domain: &str,
        platform: &str,
        handler: Arc<dyn PlatformHandler>,
    ) {
        self.platforms
            .insert((domain.to_string(), platform.to_string()), handler);
        debug!("Registered platform {}.{}", domain, platform);
    }

    fn integration(&self, domain: &str) -> Option<Arc<dyn IntegrationHandler>> {
        self.integrations.get(domain).map(|h| h.value().clone())
    }

    fn platform(&self, domain: &str, platform: &str) -> Option<Arc<dyn PlatformHandler>> {
        self.platforms
            .get(&(domain.to_string(), platform.to_string()))
            .map(|h| h.value().clone())
    }

    /// Setup an entry through its integration
    pub async fn setup(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(());
        }

        self.set_state(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let Some(handler) = self.integration(&entry.domain) else {
            self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
            debug!(
                "No integration handler for domain {}, marking as loaded",
                entry.domain
            );
            return Ok(());
        };

        if handler.async_setup_entry(Arc::clone(self), entry.clone()).await {
            self.set_state(entry_id, ConfigEntryState::Loaded, None)?;
            info!("Setup completed for entry: {} ({})", entry.title, entry_id);
            Ok(())
        } else {
            warn!("Setup failed for entry: {} ({})", entry.title, entry_id);
            self.set_state(
                entry_id,
                ConfigEntryState::SetupError,
                Some("Integration setup returned false".to_string()),
            )?;
            Err(ConfigEntriesError::SetupFailed(entry_id.to_string()))
        }
    }

    /// Unload an entry through its integration
    ///
    /// Entries that never finished setup are unloaded without calling the
    /// integration. If the integration refuses, the entry stays `Loaded`.
    pub async fn unload(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if !entry.state.can_transition_to(ConfigEntryState::UnloadInProgress) {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }
        let was_loaded = entry.is_loaded();

        self.set_state(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let unloaded = match self.integration(&entry.domain) {
            Some(handler) if was_loaded => {
                handler
                    .async_unload_entry(Arc::clone(self), entry.clone())
                    .await
            }
            _ => true,
        };

        if unloaded {
            self.set_state(entry_id, ConfigEntryState::NotLoaded, None)?;
            info!("Unloaded entry: {} ({})", entry.title, entry_id);
            Ok(())
        } else {
            warn!("Unload refused for entry: {} ({})", entry.title, entry_id);
            self.set_state(
                entry_id,
                ConfigEntryState::Loaded,
                Some("Integration unload returned false".to_string()),
            )?;
            Err(ConfigEntriesError::UnloadFailed(entry_id.to_string()))
        }
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Set up an entry on each of the given platforms concurrently.
    ///
    /// Platform failures are logged and do not fail the entry; platforms
    /// without a registered handler are skipped.
    pub async fn async_forward_entry_setups(&self, entry: &ConfigEntry, platforms: &[&str]) {
        let results = join_all(platforms.iter().map(|&platform| async move {
            let Some(handler) = self.platform(&entry.domain, platform) else {
                debug!(
                    entry_id = %entry.entry_id,
                    platform,
                    "No platform handler registered, skipping"
                );
                return None;
            };

            match handler.async_setup_entry(entry).await {
                Ok(()) => Some(platform.to_string()),
                Err(reason) => {
                    warn!(
                        entry_id = %entry.entry_id,
                        platform,
                        "Platform setup failed: {}",
                        reason
                    );
                    None
                }
            }
        }))
        .await;

        let mut loaded = self
            .loaded_platforms
            .entry(entry.entry_id.clone())
            .or_default();
        loaded.extend(results.into_iter().flatten());
        debug!(
            "Forwarded entry {} to {} platform(s)",
            entry.entry_id,
            loaded.len()
        );
    }

    /// Unload the given platforms for an entry concurrently.
    ///
    /// Returns true only if every platform unloaded. Platforms that were
    /// never set up count as unloaded.
    pub async fn async_unload_platforms(&self, entry: &ConfigEntry, platforms: &[&str]) -> bool {
        let loaded: HashSet<String> = self
            .loaded_platforms
            .get(&entry.entry_id)
            .map(|p| p.value().clone())
            .unwrap_or_default();
        let loaded = &loaded;

        let results = join_all(platforms.iter().map(|&platform| async move {
            if !loaded.contains(platform) {
                return (platform, true);
            }
            let ok = match self.platform(&entry.domain, platform) {
                Some(handler) => handler.async_unload_entry(entry).await,
                None => true,
            };
            if !ok {
                warn!(entry_id = %entry.entry_id, platform, "Platform unload failed");
            }
            (platform, ok)
        }))
        .await;

        if let Some(mut remaining) = self.loaded_platforms.get_mut(&entry.entry_id) {
            for (platform, ok) in &results {
                if *ok {
                    remaining.remove(*platform);
                }
            }
        }
        self.loaded_platforms
            .remove_if(&entry.entry_id, |_, remaining| remaining.is_empty());

        results.iter().all(|(_, ok)| *ok)
    }

    /// Platforms currently set up for an entry, sorted
    pub fn loaded_platforms(&self, entry_id: &str) -> Vec<String> {
        let mut platforms: Vec<String> = self
            .loaded_platforms
            .get(entry_id)
            .map(|p| p.iter().cloned().collect())
            .unwrap_or_default();
        platforms.sort();
        platforms
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
