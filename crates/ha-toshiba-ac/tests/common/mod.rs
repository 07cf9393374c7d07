//! Shared fakes for Toshiba AC integration tests
//!
//! The device manager is scripted: every manager the factory creates takes
//! the next connect result from a queue, and records how it was built.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ha_config_entries::{ConfigEntries, ConfigEntry, EntryStore, PlatformHandler};
use ha_toshiba_ac::{
    async_setup, DeviceCredentials, DeviceManager, DeviceManagerError, DeviceManagerFactory,
    SasTokenListener, ToshibaAcIntegration, DOMAIN, PLATFORMS,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Route integration logs to the test writer; `RUST_LOG` picks the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn connection_error(message: &str) -> DeviceManagerError {
    DeviceManagerError::Connection(message.to_string())
}

/// Device manager whose connect result is fixed at creation
pub struct FakeDeviceManager {
    pub credentials: DeviceCredentials,
    connect_result: Result<String, DeviceManagerError>,
    shutdown_result: Result<(), DeviceManagerError>,
    pub connects: AtomicUsize,
    pub shutdowns: AtomicUsize,
    listeners: Mutex<Vec<Arc<dyn SasTokenListener>>>,
}

impl FakeDeviceManager {
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Simulate the cloud issuing a new SAS token
    pub fn rotate_sas_token(&self, token: &str) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.on_sas_token_updated(token.to_string());
        }
    }
}

#[async_trait]
impl DeviceManager for FakeDeviceManager {
    async fn connect(&self) -> Result<String, DeviceManagerError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connect_result.clone()
    }

    async fn shutdown(&self) -> Result<(), DeviceManagerError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.shutdown_result.clone()
    }

    fn add_sas_token_listener(&self, listener: Arc<dyn SasTokenListener>) {
        self.listeners.lock().unwrap().push(listener);
    }
}

/// Factory handing out [`FakeDeviceManager`]s with queued connect results
pub struct ScriptedFactory {
    connect_results: Mutex<VecDeque<Result<String, DeviceManagerError>>>,
    fail_shutdown: AtomicBool,
    created: Mutex<Vec<Arc<FakeDeviceManager>>>,
}

impl ScriptedFactory {
    pub fn new(connect_results: Vec<Result<String, DeviceManagerError>>) -> Arc<Self> {
        Arc::new(Self {
            connect_results: Mutex::new(connect_results.into()),
            fail_shutdown: AtomicBool::new(false),
            created: Mutex::new(Vec::new()),
        })
    }

    /// Queue more connect results, e.g. before a reload
    pub fn push_results(&self, results: Vec<Result<String, DeviceManagerError>>) {
        self.connect_results.lock().unwrap().extend(results);
    }

    pub fn fail_shutdown(&self) {
        self.fail_shutdown.store(true, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<Arc<FakeDeviceManager>> {
        self.created.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<FakeDeviceManager> {
        self.created().last().cloned().expect("no device manager created")
    }
}

impl DeviceManagerFactory for ScriptedFactory {
    fn create(&self, credentials: &DeviceCredentials) -> Arc<dyn DeviceManager> {
        let connect_result = self
            .connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(connection_error("no scripted result")));
        let shutdown_result = if self.fail_shutdown.load(Ordering::SeqCst) {
            Err(DeviceManagerError::Shutdown("socket already closed".to_string()))
        } else {
            Ok(())
        };

        let manager = Arc::new(FakeDeviceManager {
            credentials: credentials.clone(),
            connect_result,
            shutdown_result,
            connects: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            listeners: Mutex::new(Vec::new()),
        });
        self.created.lock().unwrap().push(manager.clone());
        manager
    }
}

/// Entity platform that records calls and can refuse to unload
#[derive(Default)]
pub struct RecordingPlatform {
    pub setups: AtomicUsize,
    pub unloads: AtomicUsize,
    pub refuse_unload: AtomicBool,
    seen_sas_token: Mutex<Option<Value>>,
}

impl RecordingPlatform {
    /// `sas_token` of the entry handed to the last setup
    pub fn seen_sas_token(&self) -> Option<Value> {
        self.seen_sas_token.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformHandler for RecordingPlatform {
    async fn async_setup_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        *self.seen_sas_token.lock().unwrap() = entry.data.get("sas_token").cloned();
        Ok(())
    }

    async fn async_unload_entry(&self, _entry: &ConfigEntry) -> bool {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        !self.refuse_unload.load(Ordering::SeqCst)
    }
}

/// A host with the integration and all four platforms registered
pub struct TestHarness {
    pub dir: TempDir,
    pub entries: Arc<ConfigEntries>,
    pub factory: Arc<ScriptedFactory>,
    pub integration: Arc<ToshibaAcIntegration>,
    pub platforms: HashMap<&'static str, Arc<RecordingPlatform>>,
}

impl TestHarness {
    pub fn new(connect_results: Vec<Result<String, DeviceManagerError>>) -> Self {
        init_tracing();

        let dir = TempDir::new().unwrap();
        let entries = Arc::new(ConfigEntries::new(EntryStore::new(dir.path())));
        let factory = ScriptedFactory::new(connect_results);
        let integration = async_setup(&entries, factory.clone());

        let mut platforms = HashMap::new();
        for platform in PLATFORMS {
            let handler = Arc::new(RecordingPlatform::default());
            entries.register_platform(DOMAIN, platform, handler.clone());
            platforms.insert(platform, handler);
        }

        Self {
            dir,
            entries,
            factory,
            integration,
            platforms,
        }
    }

    /// Add a Toshiba AC entry with the given credentials
    pub async fn add_entry(&self, data: HashMap<String, Value>) -> ConfigEntry {
        self.entries
            .add(ConfigEntry::new(DOMAIN, "Toshiba AC").with_data(data))
            .await
            .unwrap()
    }

    /// Current data of an entry as stored by the host
    pub fn data(&self, entry_id: &str) -> HashMap<String, Value> {
        self.entries.get(entry_id).unwrap().data
    }

    /// Entry data as read back from disk by a fresh host
    pub async fn persisted_data(&self, entry_id: &str) -> HashMap<String, Value> {
        let reloaded = ConfigEntries::new(EntryStore::new(self.dir.path()));
        reloaded.load().await.unwrap();
        reloaded.get(entry_id).unwrap().data
    }

    /// Wait until `token` is the entry's SAS token both in memory and on disk
    pub async fn settle_sas_token(&self, entry_id: &str, token: &str) {
        let expected = json!(token);
        let settled = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.data(entry_id).get("sas_token") == Some(&expected)
                    && self.persisted_data(entry_id).await.get("sas_token") == Some(&expected)
                {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(settled.is_ok(), "sas_token never settled on {}", token);
    }

    pub fn platform(&self, name: &str) -> Arc<RecordingPlatform> {
        self.platforms[name].clone()
    }
}

/// Entry data with the four credential keys
pub fn entry_data(
    username: &str,
    password: &str,
    device_id: &str,
    sas_token: Option<&str>,
) -> HashMap<String, Value> {
    let mut data = HashMap::new();
    data.insert("username".to_string(), json!(username));
    data.insert("password".to_string(), json!(password));
    data.insert("device_id".to_string(), json!(device_id));
    if let Some(token) = sas_token {
        data.insert("sas_token".to_string(), json!(token));
    }
    data
}
