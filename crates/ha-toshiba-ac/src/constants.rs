//! Integration constants

/// Integration domain
pub const DOMAIN: &str = "toshiba_ac";

/// Entity platforms an entry is forwarded to, in setup and unload alike
pub const PLATFORMS: [&str; 4] = ["climate", "select", "sensor", "switch"];

/// Entry data keys
pub const CONF_USERNAME: &str = "username";
pub const CONF_PASSWORD: &str = "password";
pub const CONF_DEVICE_ID: &str = "device_id";
pub const CONF_SAS_TOKEN: &str = "sas_token";
