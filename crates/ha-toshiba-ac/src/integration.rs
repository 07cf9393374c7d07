//! Toshiba AC config entry lifecycle
//!
//! Setup connects a device manager with the stored SAS token. If that
//! fails, a second manager is created without a token so the cloud issues
//! a new one, which is written back into the entry. Once connected the
//! manager is registered in [`DomainData`], a [`SasTokenPersister`] is
//! attached for later rotations, and the entry as now stored is forwarded
//! to [`PLATFORMS`].
//!
//! Unload tears the platforms down first. Only if that succeeds is the
//! device manager shut down (errors logged, never blocking) and dropped.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use ha_config_entries::{
    ConfigEntries, ConfigEntriesError, ConfigEntriesResult, ConfigEntry, ConfigEntryUpdate,
    IntegrationHandler,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::constants::{DOMAIN, PLATFORMS};
use crate::credentials::{merge_sas_token, DeviceCredentials};
use crate::device_manager::{DeviceManager, DeviceManagerFactory, SasTokenListener};
use crate::error::{DeviceManagerError, ToshibaAcError, ToshibaAcResult};
use crate::lifecycle::EntryLifecycle;
use crate::registry::DomainData;

/// How a successful setup connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The stored SAS token was accepted
    Connected,
    /// A new SAS token was negotiated and written to the entry
    ConnectedWithNewToken,
}

/// How a successful unload ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnloadOutcome {
    /// Device manager shut down cleanly
    Unloaded,
    /// Device manager failed to shut down; it was dropped anyway
    ShutdownFailed(DeviceManagerError),
    /// Platforms unloaded but no device manager was registered
    NotRegistered,
}

/// Write a SAS token into an entry's current data, keeping every other key
async fn persist_sas_token(
    entries: &ConfigEntries,
    entry_id: &str,
    sas_token: &str,
) -> ConfigEntriesResult<()> {
    let entry = entries
        .get(entry_id)
        .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
    let data = merge_sas_token(&entry.data, sas_token);
    entries
        .update(entry_id, ConfigEntryUpdate::new().data(data))
        .await?;
    Ok(())
}

/// Persists SAS tokens rotated by a device manager into its config entry
///
/// The callback only queues the token. A task spawned in [`new`](Self::new)
/// writes queued tokens one at a time, in the order they arrived, and exits
/// once the persister is dropped or the host is gone.
///
/// Holds the host weakly: the host owns the integration, which owns the
/// device manager, which owns this listener.
pub struct SasTokenPersister {
    entry_id: String,
    queue: mpsc::UnboundedSender<String>,
}

impl SasTokenPersister {
    /// Must be called from within a tokio runtime
    pub fn new(entries: &Arc<ConfigEntries>, entry_id: impl Into<String>) -> Self {
        let entry_id = entry_id.into();
        let (queue, tokens) = mpsc::unbounded_channel();
        tokio::spawn(write_queued_tokens(
            Arc::downgrade(entries),
            entry_id.clone(),
            tokens,
        ));
        Self { entry_id, queue }
    }
}

async fn write_queued_tokens(
    entries: Weak<ConfigEntries>,
    entry_id: String,
    mut tokens: mpsc::UnboundedReceiver<String>,
) {
    while let Some(sas_token) = tokens.recv().await {
        let Some(entries) = entries.upgrade() else {
            debug!(
                entry_id = %entry_id,
                "Config entries no longer available, dropping SAS token"
            );
            return;
        };

        match persist_sas_token(&entries, &entry_id, &sas_token).await {
            Ok(()) => debug!(entry_id = %entry_id, "Persisted rotated SAS token"),
            Err(err) => warn!(entry_id = %entry_id, "Failed to persist SAS token: {}", err),
        }
    }
}

impl SasTokenListener for SasTokenPersister {
    fn on_sas_token_updated(&self, new_sas_token: String) {
        info!(entry_id = %self.entry_id, "SAS token updated");

        if self.queue.send(new_sas_token).is_err() {
            debug!(
                entry_id = %self.entry_id,
                "SAS token writer has stopped, dropping SAS token"
            );
        }
    }
}

/// The Toshiba AC integration
pub struct ToshibaAcIntegration {
    factory: Arc<dyn DeviceManagerFactory>,
    data: DomainData,
}

/// Create the integration and register it with the host for [`DOMAIN`]
pub fn async_setup(
    entries: &ConfigEntries,
    factory: Arc<dyn DeviceManagerFactory>,
) -> Arc<ToshibaAcIntegration> {
    let integration = Arc::new(ToshibaAcIntegration::new(factory));
    entries.register_integration(DOMAIN, integration.clone());
    integration
}

impl ToshibaAcIntegration {
    pub fn new(factory: Arc<dyn DeviceManagerFactory>) -> Self {
        Self {
            factory,
            data: DomainData::new(),
        }
    }

    /// Runtime data: registered device managers and lifecycle states
    pub fn data(&self) -> &DomainData {
        &self.data
    }

    /// Current lifecycle state of an entry
    pub fn lifecycle(&self, entry_id: &str) -> EntryLifecycle {
        self.data.lifecycle(entry_id)
    }

    /// Set up an entry, reporting exactly why it failed
    pub async fn try_setup_entry(
        &self,
        entries: &Arc<ConfigEntries>,
        entry: &ConfigEntry,
    ) -> ToshibaAcResult<SetupOutcome> {
        let entry_id = entry.entry_id.as_str();

        if self.data.contains(entry_id) {
            return Err(ToshibaAcError::AlreadyRegistered(entry_id.to_string()));
        }
        self.data.transition(entry_id, EntryLifecycle::Connecting)?;

        let (manager, outcome) = match self.connect(entries, entry).await {
            Ok(connected) => connected,
            Err(err) => {
                self.data.transition(entry_id, EntryLifecycle::Failed)?;
                return Err(err);
            }
        };

        if let Err(err) = self.data.insert(entry_id, Arc::clone(&manager)) {
            if let Err(shutdown_err) = manager.shutdown().await {
                warn!(
                    entry_id,
                    "Failed to shut down unregistered device manager: {}", shutdown_err
                );
            }
            self.data.transition(entry_id, EntryLifecycle::Failed)?;
            return Err(err);
        }
        manager.add_sas_token_listener(Arc::new(SasTokenPersister::new(entries, entry_id)));
        self.data.transition(entry_id, EntryLifecycle::Connected)?;

        // Platforms see the token negotiated above, not the one we started with
        let current = entries.get(entry_id).unwrap_or_else(|| entry.clone());
        entries.async_forward_entry_setups(&current, &PLATFORMS).await;

        Ok(outcome)
    }

    /// Connect with the stored token, falling back to a freshly issued one
    async fn connect(
        &self,
        entries: &ConfigEntries,
        entry: &ConfigEntry,
    ) -> ToshibaAcResult<(Arc<dyn DeviceManager>, SetupOutcome)> {
        let entry_id = entry.entry_id.as_str();
        let credentials = DeviceCredentials::from_entry_data(&entry.data)?;

        let manager = self.factory.create(&credentials);
        match manager.connect().await {
            Ok(_) => return Ok((manager, SetupOutcome::Connected)),
            Err(err) => warn!(
                entry_id,
                "Initial connection failed ({}), trying to get new sas_token...", err
            ),
        }
        drop(manager);

        self.data
            .transition(entry_id, EntryLifecycle::ReconnectingWithNewToken)?;

        let manager = self.factory.create(&credentials.without_sas_token());
        let new_sas_token = manager
            .connect()
            .await
            .map_err(|source| ToshibaAcError::Connectivity { attempt: 2, source })?;

        info!(entry_id, "Successfully got new sas_token!");

        // The connection is live either way; a later rotation persists again.
        if let Err(err) = persist_sas_token(entries, entry_id, &new_sas_token).await {
            warn!(entry_id, "Failed to persist new sas_token: {}", err);
        }

        Ok((manager, SetupOutcome::ConnectedWithNewToken))
    }

    /// Unload an entry, reporting exactly why it stayed loaded
    pub async fn try_unload_entry(
        &self,
        entries: &ConfigEntries,
        entry: &ConfigEntry,
    ) -> ToshibaAcResult<UnloadOutcome> {
        let entry_id = entry.entry_id.as_str();
        info!(entry_id, "Unload Toshiba integration");

        let tracked = self.data.lifecycle(entry_id) == EntryLifecycle::Connected;
        if tracked {
            self.data.transition(entry_id, EntryLifecycle::Unloading)?;
        }

        if !entries.async_unload_platforms(entry, &PLATFORMS).await {
            if tracked {
                self.data.transition(entry_id, EntryLifecycle::Connected)?;
            }
            return Err(ToshibaAcError::PlatformTeardown(entry_id.to_string()));
        }

        let outcome = match self.data.get(entry_id) {
            Some(manager) => match manager.shutdown().await {
                Ok(()) => UnloadOutcome::Unloaded,
                Err(err) => {
                    error!(entry_id, "Error while unloading Toshiba integration {}", err);
                    UnloadOutcome::ShutdownFailed(err)
                }
            },
            None => {
                warn!(entry_id, "No device manager registered for entry");
                UnloadOutcome::NotRegistered
            }
        };
        self.data.remove(entry_id);

        if tracked {
            self.data.transition(entry_id, EntryLifecycle::Unloaded)?;
        }

        Ok(outcome)
    }
}

#[async_trait]
impl IntegrationHandler for ToshibaAcIntegration {
    async fn async_setup_entry(&self, entries: Arc<ConfigEntries>, entry: ConfigEntry) -> bool {
        match self.try_setup_entry(&entries, &entry).await {
            Ok(outcome) => {
                debug!(entry_id = %entry.entry_id, "Toshiba AC entry set up: {:?}", outcome);
                true
            }
            Err(ToshibaAcError::Connectivity { source, .. }) => {
                warn!(
                    entry_id = %entry.entry_id,
                    "Connection failed on second try ({}), aborting!", source
                );
                false
            }
            Err(err) => {
                error!(entry_id = %entry.entry_id, "Toshiba AC setup failed: {}", err);
                false
            }
        }
    }

    async fn async_unload_entry(&self, entries: Arc<ConfigEntries>, entry: ConfigEntry) -> bool {
        match self.try_unload_entry(&entries, &entry).await {
            Ok(_) => true,
            Err(err) => {
                warn!(entry_id = %entry.entry_id, "Toshiba AC unload failed: {}", err);
                false
            }
        }
    }
}
