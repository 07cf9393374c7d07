//! Credentials stored in a Toshiba AC config entry

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::CONF_SAS_TOKEN;

/// Account credentials and device binding read from entry data
///
/// `sas_token` may be missing, `null`, or stale; the device manager is
/// expected to negotiate a new one when it is absent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredentials {
    pub username: String,
    pub password: String,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sas_token: Option<String>,
}

impl DeviceCredentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        device_id: impl Into<String>,
        sas_token: Option<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            device_id: device_id.into(),
            sas_token,
        }
    }

    /// Parse credentials out of config entry data. Unknown keys are ignored.
    pub fn from_entry_data(data: &HashMap<String, Value>) -> Result<Self, serde_json::Error> {
        let object = data
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::from_value(Value::Object(object))
    }

    /// Same account and device, without a token
    pub fn without_sas_token(&self) -> Self {
        Self {
            sas_token: None,
            ..self.clone()
        }
    }
}

// Keep secrets out of logs.
impl fmt::Debug for DeviceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("device_id", &self.device_id)
            .field("sas_token", &self.sas_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Copy of `data` with only the SAS token replaced
pub fn merge_sas_token(data: &HashMap<String, Value>, sas_token: &str) -> HashMap<String, Value> {
    let mut merged = data.clone();
    merged.insert(
        CONF_SAS_TOKEN.to_string(),
        Value::String(sas_token.to_string()),
    );
    merged
}
