//! Devices and the devices registry.
//!
//! A device is a named owner of an ordered settings collection. Devices are
//! created only through the registry, which enforces name uniqueness and
//! reconciles every setting against the persisted store before anything is
//! registered. A failure partway through (duplicate setting name, cast
//! failure on a persisted value) leaves the registry unchanged; baselines
//! already written for earlier settings stay in the store and are picked up
//! on the next attempt.

use crate::error::SettingsError;
use crate::setting::{validate_name, Setting, Settings};
use crate::store::SettingsStore;
use crate::value::SettingValue;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named owner of one settings collection.
pub struct Device {
    name: String,
    settings: Settings,
}

impl Device {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable access to the settings, e.g. for registering update hooks
    /// after the device was created.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .finish()
    }
}

/// Keyed store of every device in the process.
///
/// Constructed explicitly at startup and passed to whatever needs lookup or
/// mutation; there is no global instance. `update_device_setting` is the
/// sole mutation entry point reachable from outside the process.
pub struct DevicesRegistry {
    devices: HashMap<String, Device>,
    store: Arc<dyn SettingsStore>,
}

impl DevicesRegistry {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            devices: HashMap::new(),
            store,
        }
    }

    /// Create a device and register it.
    ///
    /// Settings are processed in order: the first duplicate name aborts the
    /// whole construction. For each setting the persisted store is consulted
    /// under `{device}.{setting}`; an absent key gets the compiled-in value
    /// written as the new baseline, a present key overrides the compiled-in
    /// value. The device is registered only after every setting succeeded.
    pub fn create_device(
        &mut self,
        name: &str,
        settings: Vec<Setting>,
    ) -> Result<(), SettingsError> {
        validate_name(name)?;
        if self.devices.contains_key(name) {
            return Err(SettingsError::DuplicateDevice(name.to_string()));
        }

        let mut collection = Settings::default();
        for mut setting in settings {
            if collection.contains(setting.name()) {
                return Err(SettingsError::DuplicateSetting(setting.name().to_string()));
            }
            let key = format!("{}.{}", name, setting.name());
            setting.attach(self.store.clone(), key)?;
            collection.insert(setting)?;
        }

        self.devices.insert(
            name.to_string(),
            Device {
                name: name.to_string(),
                settings: collection,
            },
        );
        Ok(())
    }

    /// Update one setting of one device, the externally driven mutation path.
    ///
    /// Unknown device or setting names fail without touching the store.
    /// Cast failures propagate from the setting itself. When the value
    /// actually changed, the persisted `{device}.{setting}.value` entry is
    /// rewritten here as well, keeping both write paths consistent. Returns
    /// whether the value changed.
    pub fn update_device_setting(
        &mut self,
        device: &str,
        setting: &str,
        value: impl Into<SettingValue>,
    ) -> Result<bool, SettingsError> {
        let dev = self
            .devices
            .get_mut(device)
            .ok_or_else(|| SettingsError::UnknownDevice(device.to_string()))?;
        let entry = dev
            .settings
            .get_mut(setting)
            .ok_or_else(|| SettingsError::UnknownSetting {
                device: device.to_string(),
                setting: setting.to_string(),
            })?;

        let changed = entry.update(value)?;
        if changed {
            let key = format!("{device}.{setting}.value");
            let text = entry.value().to_text();
            self.store.write(&key, json!(text))?;
        }
        Ok(changed)
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn device_mut(&mut self, name: &str) -> Option<&mut Device> {
        self.devices.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    /// Iterate all registered devices.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Empty the registry. Intended for tests; devices are otherwise never
    /// destroyed during the process lifetime.
    pub fn reset(&mut self) {
        self.devices.clear();
    }
}

impl fmt::Debug for DevicesRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevicesRegistry")
            .field("devices", &self.devices)
            .finish()
    }
}
