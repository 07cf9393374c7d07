//! Config Entries
//!
//! This crate provides the configuration entry system: the entries
//! themselves, their lifecycle states, and the [`ConfigEntries`] manager
//! that persists them and drives integration setup and unload.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`IntegrationHandler`] / [`PlatformHandler`] - Hooks integrations register
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking.

pub mod entry;
pub mod handler;
pub mod manager;
pub mod state_machine;
pub mod storage;

// Re-export main types
pub use entry::{
    ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate,
};

pub use handler::{IntegrationHandler, PlatformHandler};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use state_machine::InvalidTransition;

pub use storage::{EntryStore, StorageError, StorageFile, StorageResult};
