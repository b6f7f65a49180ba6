//! Typed, validated, persisted settings.
//!
//! A setting is a single named value with an enforced kind, a human-readable
//! description and an optional update hook. Settings become durable when the
//! owning device attaches them to the persistent store: a persisted value
//! overrides the compiled-in default, otherwise the default is written out
//! as the new baseline.

use crate::error::SettingsError;
use crate::store::SettingsStore;
use crate::value::{SettingKind, SettingValue};
use serde_json::json;
use std::fmt;
use std::sync::Arc;

/// Callback invoked after a setting value actually changed.
pub type UpdateHook = Box<dyn FnMut(&SettingValue) + Send>;

/// Reject names containing the `.` separator used by dotted store keys.
pub(crate) fn validate_name(name: &str) -> Result<(), SettingsError> {
    if name.contains('.') {
        return Err(SettingsError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Storage binding established when a device attaches the setting.
struct Binding {
    key: String,
    store: Arc<dyn SettingsStore>,
}

/// A single named, typed, validated, persisted configuration value.
pub struct Setting {
    name: String,
    value: SettingValue,
    kind: SettingKind,
    description: String,
    binding: Option<Binding>,
    on_update: Option<UpdateHook>,
}

impl Setting {
    /// Create a setting with a compiled-in initial value.
    ///
    /// The kind is derived from the initial value and never changes
    /// afterwards. Fails when the name contains `.`.
    pub fn new(
        name: impl Into<String>,
        value: impl Into<SettingValue>,
        description: impl Into<String>,
    ) -> Result<Self, SettingsError> {
        let name = name.into();
        validate_name(&name)?;
        let value = value.into();
        Ok(Self {
            kind: value.kind(),
            name,
            value,
            description: description.into(),
            binding: None,
            on_update: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    pub fn kind(&self) -> SettingKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Register the update hook, silently replacing any previous one.
    /// At most one hook is active at a time.
    pub fn set_on_update(&mut self, hook: UpdateHook) {
        self.on_update = Some(hook);
    }

    /// Update the value, casting to the declared kind if needed.
    ///
    /// Only when the cast value differs from the current one is it stored,
    /// written through to the persistent store and handed to the update
    /// hook. An unchanged value is a complete no-op, so repeating an update
    /// fires the hook and writes the store at most once. Returns whether the
    /// value changed.
    pub fn update(&mut self, value: impl Into<SettingValue>) -> Result<bool, SettingsError> {
        let value = value.into().cast_to(self.kind)?;
        if value == self.value {
            return Ok(false);
        }
        self.value = value;
        self.persist_value()?;
        if let Some(hook) = self.on_update.as_mut() {
            hook(&self.value);
        }
        Ok(true)
    }

    /// Bind this setting to the store and reconcile against persisted state.
    ///
    /// An absent key gets the compiled-in value written as the new baseline,
    /// together with the type discriminator and description. A present key
    /// overrides the compiled-in value, cast to the declared kind.
    pub(crate) fn attach(
        &mut self,
        store: Arc<dyn SettingsStore>,
        key: String,
    ) -> Result<(), SettingsError> {
        match store.read(&key)? {
            None => {
                let record = json!({
                    "value": self.value.to_text(),
                    "type": self.kind.as_str(),
                    "description": self.description,
                });
                store.write(&key, record)?;
            }
            Some(record) => {
                let map = record
                    .as_object()
                    .ok_or_else(|| SettingsError::InvalidRecord(key.clone()))?;
                if let Some(name) = map.get("type").and_then(|t| t.as_str()) {
                    // Unknown discriminators are rejected; a mismatch against
                    // the declared kind is resolved by the cast below.
                    SettingKind::parse(name)?;
                }
                let text = map
                    .get("value")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| SettingsError::InvalidRecord(key.clone()))?;
                self.value = SettingValue::from(text).cast_to(self.kind)?;
            }
        }
        self.binding = Some(Binding { key, store });
        Ok(())
    }

    fn persist_value(&self) -> Result<(), SettingsError> {
        if let Some(binding) = &self.binding {
            let key = format!("{}.value", binding.key);
            binding
                .store
                .write(&key, json!(self.value.to_text()))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setting")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Insertion-ordered collection of uniquely named settings, owned by one
/// device.
#[derive(Debug, Default)]
pub struct Settings {
    entries: Vec<Setting>,
}

impl Settings {
    /// Add a setting, rejecting duplicate names.
    pub(crate) fn insert(&mut self, setting: Setting) -> Result<(), SettingsError> {
        if self.contains(setting.name()) {
            return Err(SettingsError::DuplicateSetting(setting.name().to_string()));
        }
        self.entries.push(setting);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Setting> {
        self.entries.iter().find(|s| s.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Setting> {
        self.entries.iter_mut().find(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate settings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Setting> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
