//! Per-entry connection lifecycle
//!
//! ```text
//! Unconfigured → Connecting → Connected
//!                          ↘ ReconnectingWithNewToken → Connected
//!                                                     ↘ Failed
//!
//! Connected → Unloading → Unloaded
//!                       ↘ Connected (platforms refused to unload)
//! ```
//!
//! `Failed` and `Unloaded` end one setup attempt; a new setup starts again
//! at `Connecting`.

use serde::Serialize;
use thiserror::Error;

/// Connection state of one config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryLifecycle {
    #[default]
    Unconfigured,
    /// First attempt, with the stored SAS token
    Connecting,
    /// Second attempt, negotiating a new SAS token
    ReconnectingWithNewToken,
    Connected,
    Failed,
    Unloading,
    Unloaded,
}

/// Error when an invalid lifecycle transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid lifecycle transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: EntryLifecycle,
    pub to: EntryLifecycle,
}

impl EntryLifecycle {
    /// Attempt a transition to a new state.
    pub fn try_transition(self, to: EntryLifecycle) -> Result<EntryLifecycle, InvalidTransition> {
        use EntryLifecycle::*;

        let valid = match (self, to) {
            (Unconfigured | Failed | Unloaded, Connecting) => true,

            (Connecting, Connected) => true,
            (Connecting, ReconnectingWithNewToken) => true,
            // Bad entry data fails before any connection attempt
            (Connecting, Failed) => true,

            (ReconnectingWithNewToken, Connected) => true,
            (ReconnectingWithNewToken, Failed) => true,

            (Connected, Unloading) => true,
            (Unloading, Unloaded) => true,
            (Unloading, Connected) => true,

            _ => false,
        };

        if valid {
            Ok(to)
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }

    pub fn can_transition_to(self, to: EntryLifecycle) -> bool {
        self.try_transition(to).is_ok()
    }

    /// True once a setup attempt has ended for good
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryLifecycle::Failed | EntryLifecycle::Unloaded)
    }

    /// True while a connection attempt is running
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            EntryLifecycle::Connecting | EntryLifecycle::ReconnectingWithNewToken
        )
    }
}
