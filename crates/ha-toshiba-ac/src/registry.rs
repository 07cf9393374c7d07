//! Per-integration runtime data
//!
//! Holds the device manager of every loaded entry plus the lifecycle state
//! of every entry the integration has seen. Owned by the integration
//! instance rather than a process global, and torn down one entry at a
//! time since several accounts can be configured side by side.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::device_manager::DeviceManager;
use crate::error::{ToshibaAcError, ToshibaAcResult};
use crate::lifecycle::{EntryLifecycle, InvalidTransition};

/// Device managers and lifecycle states keyed by entry id
#[derive(Default)]
pub struct DomainData {
    managers: DashMap<String, Arc<dyn DeviceManager>>,
    lifecycle: DashMap<String, EntryLifecycle>,
}

impl DomainData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the device manager of an entry. At most one per entry.
    pub fn insert(&self, entry_id: &str, manager: Arc<dyn DeviceManager>) -> ToshibaAcResult<()> {
        match self.managers.entry(entry_id.to_string()) {
            Entry::Occupied(_) => Err(ToshibaAcError::AlreadyRegistered(entry_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(manager);
                debug!("Registered device manager for entry {}", entry_id);
                Ok(())
            }
        }
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<dyn DeviceManager>> {
        self.managers.get(entry_id).map(|m| Arc::clone(m.value()))
    }

    pub fn remove(&self, entry_id: &str) -> Option<Arc<dyn DeviceManager>> {
        let removed = self.managers.remove(entry_id).map(|(_, m)| m);
        if removed.is_some() {
            debug!("Removed device manager for entry {}", entry_id);
        }
        removed
    }

    pub fn contains(&self, entry_id: &str) -> bool {
        self.managers.contains_key(entry_id)
    }

    /// Number of registered device managers
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Entry ids with a registered device manager, sorted
    pub fn entry_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.managers.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Lifecycle state of an entry; `Unconfigured` if never seen
    pub fn lifecycle(&self, entry_id: &str) -> EntryLifecycle {
        self.lifecycle
            .get(entry_id)
            .map(|s| *s.value())
            .unwrap_or_default()
    }

    /// Validate and apply a lifecycle transition for an entry
    pub fn transition(
        &self,
        entry_id: &str,
        to: EntryLifecycle,
    ) -> Result<EntryLifecycle, InvalidTransition> {
        let mut state = self.lifecycle.entry(entry_id.to_string()).or_default();
        *state = state.try_transition(to)?;
        debug!("Entry {} lifecycle changed to {:?}", entry_id, to);
        Ok(to)
    }
}
