//! Device manager collaborator contract
//!
//! The device manager owns the connection to the Toshiba cloud and the
//! devices behind it. Implementations live outside this crate; the
//! integration only needs to create one from credentials, connect it, shut
//! it down, and hear about SAS token rotations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::credentials::DeviceCredentials;
use crate::error::DeviceManagerError;

/// Observer for SAS tokens issued by a device manager after connect
pub trait SasTokenListener: Send + Sync {
    /// Called with every newly issued token. Must return promptly and never
    /// fail; any IO happens after the call returns.
    fn on_sas_token_updated(&self, new_sas_token: String);
}

/// A connected (or connectable) Toshiba AC device manager
#[async_trait]
pub trait DeviceManager: Send + Sync {
    /// Establish connectivity. Returns the SAS token in use, which is newly
    /// issued when the manager was created without one.
    async fn connect(&self) -> Result<String, DeviceManagerError>;

    /// Close the connection and release devices
    async fn shutdown(&self) -> Result<(), DeviceManagerError>;

    /// Register a listener for later SAS token rotations
    fn add_sas_token_listener(&self, listener: Arc<dyn SasTokenListener>);
}

/// Creates device managers for a set of credentials
pub trait DeviceManagerFactory: Send + Sync {
    fn create(&self, credentials: &DeviceCredentials) -> Arc<dyn DeviceManager>;
}

impl<F> DeviceManagerFactory for F
where
    F: Fn(&DeviceCredentials) -> Arc<dyn DeviceManager> + Send + Sync,
{
    fn create(&self, credentials: &DeviceCredentials) -> Arc<dyn DeviceManager> {
        self(credentials)
    }
}
