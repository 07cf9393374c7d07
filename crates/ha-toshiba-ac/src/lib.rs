//! Toshiba AC integration
//!
//! Connects a config entry to a Toshiba AC device manager. The device
//! manager itself (cloud transport, AMQP, SAS token issuance) is an external
//! collaborator reached through the [`DeviceManager`] trait; this crate owns
//! only the entry lifecycle around it:
//!
//! - connect with the stored SAS token, and on failure reconnect without a
//!   token so a fresh one is negotiated and persisted
//! - persist every SAS token the device manager rotates later on
//! - keep one device manager per loaded entry in [`DomainData`]
//! - forward the entry to the climate/select/sensor/switch platforms and
//!   tear everything down again on unload

pub mod constants;
pub mod credentials;
pub mod device_manager;
pub mod error;
pub mod integration;
pub mod lifecycle;
pub mod registry;

pub use constants::{
    CONF_DEVICE_ID, CONF_PASSWORD, CONF_SAS_TOKEN, CONF_USERNAME, DOMAIN, PLATFORMS,
};
pub use credentials::DeviceCredentials;
pub use device_manager::{DeviceManager, DeviceManagerFactory, SasTokenListener};
pub use error::{DeviceManagerError, ToshibaAcError, ToshibaAcResult};
pub use integration::{
    async_setup, SasTokenPersister, SetupOutcome, ToshibaAcIntegration, UnloadOutcome,
};
pub use lifecycle::{EntryLifecycle, InvalidTransition};
pub use registry::DomainData;
