//! Persistent per-device settings.
//!
//! Devices are keyed by their USB identity so a configuration follows the
//! adapter rather than the port it happens to be plugged into. TCP
//! endpoints use the same record with a synthetic identity.
//!
//! The file format is versioned JSON:
//!
//! ```json
//! { "version": 1, "devices": [ { "id": { "vendor_id": 1027, ... }, ... } ] }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::REALDASH;

/// Version written by [`DeviceConfigStore::save`].
pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// USB identity of a device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    pub vendor_id: u16,
    pub product_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl DeviceId {
    pub fn new(vendor_id: u16, product_id: u16, serial_number: Option<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            serial_number,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)?;
        if let Some(serial) = &self.serial_number {
            write!(f, ":{}", serial)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    UsbSerial,
    TcpServer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

/// Serial line parameters for `usb_serial` devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// 5 to 8.
    pub data_bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub dtr: bool,
    pub rts: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            dtr: false,
            rts: false,
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<()> {
        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::Config(format!(
                "data bits must be 5 to 8, got {}",
                self.data_bits
            )));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud rate must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    /// Name of a registered frame protocol.
    pub protocol: String,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub serial: SerialConfig,
    /// Listen address for `tcp_server` devices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<SocketAddr>,
}

impl DeviceConfig {
    pub fn usb_serial(id: DeviceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: DeviceKind::UsbSerial,
            protocol: REALDASH.to_string(),
            auto_connect: false,
            serial: SerialConfig::default(),
            listen: None,
        }
    }

    pub fn tcp_server(id: DeviceId, name: impl Into<String>, listen: SocketAddr) -> Self {
        Self {
            kind: DeviceKind::TcpServer,
            listen: Some(listen),
            ..Self::usb_serial(id, name)
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.protocol.is_empty() {
            return Err(Error::Config(format!("device {} has no protocol", self.id)));
        }
        match self.kind {
            DeviceKind::UsbSerial => self.serial.validate(),
            DeviceKind::TcpServer if self.listen.is_none() => Err(Error::Config(format!(
                "tcp_server device {} has no listen address",
                self.id
            ))),
            DeviceKind::TcpServer => Ok(()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ConfigFile {
    version: u32,
    #[serde(default)]
    devices: Vec<DeviceConfig>,
}

/// Device settings backed by a JSON file.
#[derive(Debug, Clone)]
pub struct DeviceConfigStore {
    path: PathBuf,
    devices: BTreeMap<DeviceId, DeviceConfig>,
}

impl DeviceConfigStore {
    /// Loads the store at `path`. A missing file gives an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut devices = BTreeMap::new();

        if path.exists() {
            let content = fs::read_to_string(&path)?;
            let file: ConfigFile = serde_json::from_str(&content)?;
            if file.version != CONFIG_VERSION {
                return Err(Error::Config(format!(
                    "unsupported device config version {} in {}",
                    file.version,
                    path.display()
                )));
            }
            for device in file.devices {
                device.validate()?;
                devices.insert(device.id.clone(), device);
            }
            info!("loaded {} devices from {}", devices.len(), path.display());
        } else {
            debug!("{} not found, starting with no devices", path.display());
        }

        Ok(Self { path, devices })
    }

    /// Writes the store to its file, replacing it atomically.
    pub fn save(&self) -> Result<()> {
        let file = ConfigFile {
            version: CONFIG_VERSION,
            devices: self.devices.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, json)?;
        fs::rename(&temp_path, &self.path)?;
        debug!("saved {} devices to {}", self.devices.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &DeviceId) -> Option<&DeviceConfig> {
        self.devices.get(id)
    }

    /// Inserts or replaces the settings for `config.id`. Returns the
    /// previous settings, if any.
    pub fn upsert(&mut self, config: DeviceConfig) -> Result<Option<DeviceConfig>> {
        config.validate()?;
        Ok(self.devices.insert(config.id.clone(), config))
    }

    pub fn remove(&mut self, id: &DeviceId) -> Option<DeviceConfig> {
        self.devices.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceConfig> + '_ {
        self.devices.values()
    }

    /// Devices to connect at startup.
    pub fn auto_connect(&self) -> impl Iterator<Item = &DeviceConfig> + '_ {
        self.iter().filter(|device| device.auto_connect)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usb_id(serial: &str) -> DeviceId {
        DeviceId::new(0x0403, 0x6001, Some(serial.to_string()))
    }

    fn store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("devices.json")
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceConfigStore::load(store_path(&dir)).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DeviceConfigStore::load(store_path(&dir)).unwrap();

        let serial = DeviceConfig::usb_serial(usb_id("A1"), "dash")
            .with_auto_connect(true)
            .with_serial(SerialConfig {
                baud_rate: 500_000,
                parity: Parity::Even,
                stop_bits: StopBits::Two,
                dtr: true,
                ..SerialConfig::default()
            });
        let tcp = DeviceConfig::tcp_server(
            DeviceId::new(0, 0, Some("tcp-1".to_string())),
            "tablet",
            "0.0.0.0:35000".parse().unwrap(),
        );
        store.upsert(serial.clone()).unwrap();
        store.upsert(tcp.clone()).unwrap();
        store.save().unwrap();
        assert!(!dir.path().join("devices.json.tmp").exists());

        let loaded = DeviceConfigStore::load(store_path(&dir)).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&serial.id), Some(&serial));
        assert_eq!(loaded.get(&tcp.id), Some(&tcp));
        let auto: Vec<_> = loaded.auto_connect().map(|d| d.name.as_str()).collect();
        assert_eq!(auto, vec!["dash"]);
    }

    #[test]
    fn test_upsert_replaces_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DeviceConfigStore::load(store_path(&dir)).unwrap();

        let first = DeviceConfig::usb_serial(usb_id("A1"), "first");
        assert_eq!(store.upsert(first.clone()).unwrap(), None);
        let second = DeviceConfig::usb_serial(usb_id("A1"), "second");
        assert_eq!(store.upsert(second.clone()).unwrap(), Some(first));
        assert_eq!(store.len(), 1);

        assert_eq!(store.remove(&usb_id("A1")), Some(second));
        assert_eq!(store.remove(&usb_id("A1")), None);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "version": 1,
            "devices": [{
                "id": { "vendor_id": 1027, "product_id": 24577 },
                "name": "bare",
                "kind": "usb_serial",
                "protocol": "RealDash"
            }]
        }"#;
        fs::write(store_path(&dir), json).unwrap();

        let store = DeviceConfigStore::load(store_path(&dir)).unwrap();
        let device = store.get(&DeviceId::new(1027, 24577, None)).unwrap();
        assert!(!device.auto_connect);
        assert_eq!(device.serial, SerialConfig::default());
        assert_eq!(device.serial.baud_rate, 115_200);
    }

    #[test]
    fn test_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(store_path(&dir), r#"{ "version": 2, "devices": [] }"#).unwrap();
        assert!(matches!(
            DeviceConfigStore::load(store_path(&dir)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(store_path(&dir), "{ not json").unwrap();
        assert!(matches!(
            DeviceConfigStore::load(store_path(&dir)),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DeviceConfigStore::load(store_path(&dir)).unwrap();

        let bad_bits = DeviceConfig::usb_serial(usb_id("A1"), "x").with_serial(SerialConfig {
            data_bits: 9,
            ..SerialConfig::default()
        });
        assert!(matches!(store.upsert(bad_bits), Err(Error::Config(_))));

        let mut no_listen = DeviceConfig::tcp_server(usb_id("A2"), "y", "127.0.0.1:1".parse().unwrap());
        no_listen.listen = None;
        assert!(matches!(store.upsert(no_listen), Err(Error::Config(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_display_id() {
        assert_eq!(usb_id("A1").to_string(), "0403:6001:A1");
        assert_eq!(DeviceId::new(1, 2, None).to_string(), "0001:0002");
    }
}
