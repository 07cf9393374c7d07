//! Host-side entry state machine
//!
//! ```text
//! NotLoaded → SetupInProgress → Loaded
//!                            ↘ SetupError → SetupInProgress (retry)
//!
//! Loaded/SetupError → UnloadInProgress → NotLoaded
//!                                      ↘ Loaded (platforms refused to unload)
//! ```

use crate::entry::ConfigEntryState;
use thiserror::Error;

/// A state change the host refused to make
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Entry cannot move from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// States reachable in one step
    pub fn successors(self) -> &'static [ConfigEntryState] {
        use ConfigEntryState::*;

        match self {
            NotLoaded => &[SetupInProgress],
            SetupInProgress => &[Loaded, SetupError],
            SetupError => &[SetupInProgress, UnloadInProgress],
            Loaded => &[UnloadInProgress],
            UnloadInProgress => &[NotLoaded, Loaded],
        }
    }

    pub fn try_transition(
        self,
        to: ConfigEntryState,
    ) -> Result<ConfigEntryState, InvalidTransition> {
        if self.successors().contains(&to) {
            return Ok(to);
        }
        Err(InvalidTransition {
            from: self,
            to,
            reason: self.refusal(),
        })
    }

    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.successors().contains(&to)
    }

    fn refusal(self) -> &'static str {
        use ConfigEntryState::*;

        match self {
            NotLoaded => "entry must be set up first",
            SetupInProgress => "setup has not finished",
            SetupError => "setup failed; retry or unload",
            Loaded => "entry is loaded; unload it first",
            UnloadInProgress => "unload has not finished",
        }
    }
}
