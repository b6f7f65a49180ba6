//! Local and remote sensors.
//!
//! Sensors are single scalar readings keyed by name. A remote sensor lives
//! on another device: its value is pulled in from inbound broker messages
//! and its hook fires only when the value actually changed. A local sensor
//! is an instrument on this device: every update is recorded and pushed
//! outward, with no change suppression, so subscribers see every sample.
//!
//! Sensor topics default to `{topic_root}/{name}`; an explicit override can
//! be given at registration for sensors that live under a foreign namespace.

use crate::error::SettingsError;
use crate::value::SettingValue;
use std::collections::HashMap;
use std::fmt;

/// Callback invoked after a remote sensor value changed.
pub type SensorHook = Box<dyn FnMut(&SettingValue) + Send>;

/// An outbound sensor reading: the topic to publish on and the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub topic: String,
    pub payload: String,
}

/// A sensor fed from inbound broker messages.
pub struct RemoteSensor {
    name: String,
    topic: String,
    custom_topic: bool,
    value: Option<SettingValue>,
    on_update: Option<SensorHook>,
}

impl RemoteSensor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the topic was explicitly overridden at registration.
    pub fn has_custom_topic(&self) -> bool {
        self.custom_topic
    }

    /// The last known reading, if any message arrived yet.
    pub fn value(&self) -> Option<&SettingValue> {
        self.value.as_ref()
    }
}

impl fmt::Debug for RemoteSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSensor")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("value", &self.value)
            .finish()
    }
}

/// Registry of remote sensors, keyed by name.
pub struct RemoteSensorsRegistry {
    topic_root: String,
    sensors: HashMap<String, RemoteSensor>,
}

impl RemoteSensorsRegistry {
    pub fn new(topic_root: impl Into<String>) -> Self {
        Self {
            topic_root: topic_root.into(),
            sensors: HashMap::new(),
        }
    }

    /// Register a sensor under the name-derived topic `{root}/{name}`.
    pub fn register(&mut self, name: &str) {
        let topic = format!("{}/{}", self.topic_root, name);
        self.insert(name, topic, false);
    }

    /// Register a sensor with an explicit topic override.
    pub fn register_with_topic(&mut self, name: &str, topic: impl Into<String>) {
        self.insert(name, topic.into(), true);
    }

    fn insert(&mut self, name: &str, topic: String, custom_topic: bool) {
        self.sensors.insert(
            name.to_string(),
            RemoteSensor {
                name: name.to_string(),
                topic,
                custom_topic,
                value: None,
                on_update: None,
            },
        );
    }

    /// Apply an inbound payload to a sensor.
    ///
    /// The payload becomes the new value; the hook fires only when the value
    /// actually changed. Returns whether it did.
    pub fn update(&mut self, name: &str, payload: &str) -> Result<bool, SettingsError> {
        let sensor = self
            .sensors
            .get_mut(name)
            .ok_or_else(|| SettingsError::UnknownSensor(name.to_string()))?;

        let value = SettingValue::Text(payload.to_string());
        if sensor.value.as_ref() == Some(&value) {
            return Ok(false);
        }
        sensor.value = Some(value);
        if let Some(hook) = sensor.on_update.as_mut() {
            if let Some(value) = sensor.value.as_ref() {
                hook(value);
            }
        }
        Ok(true)
    }

    /// Register the update hook, silently replacing any previous one.
    pub fn set_on_update(&mut self, name: &str, hook: SensorHook) -> Result<(), SettingsError> {
        let sensor = self
            .sensors
            .get_mut(name)
            .ok_or_else(|| SettingsError::UnknownSensor(name.to_string()))?;
        sensor.on_update = Some(hook);
        Ok(())
    }

    pub fn sensor(&self, name: &str) -> Option<&RemoteSensor> {
        self.sensors.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteSensor> {
        self.sensors.values()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Empty the registry. Intended for tests.
    pub fn reset(&mut self) {
        self.sensors.clear();
    }
}

impl fmt::Debug for RemoteSensorsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSensorsRegistry")
            .field("sensors", &self.sensors)
            .finish()
    }
}

/// A sensor local to this device.
#[derive(Debug)]
pub struct LocalSensor {
    name: String,
    topic: String,
    value: Option<SettingValue>,
}

impl LocalSensor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn value(&self) -> Option<&SettingValue> {
        self.value.as_ref()
    }
}

/// Registry of local sensors, keyed by name.
#[derive(Debug)]
pub struct LocalSensorsRegistry {
    topic_root: String,
    sensors: HashMap<String, LocalSensor>,
}

impl LocalSensorsRegistry {
    pub fn new(topic_root: impl Into<String>) -> Self {
        Self {
            topic_root: topic_root.into(),
            sensors: HashMap::new(),
        }
    }

    /// Register a sensor under the name-derived topic `{root}/{name}`.
    pub fn register(&mut self, name: &str) {
        let topic = format!("{}/{}", self.topic_root, name);
        self.insert(name, topic);
    }

    /// Register a sensor with an explicit topic override.
    pub fn register_with_topic(&mut self, name: &str, topic: impl Into<String>) {
        self.insert(name, topic.into());
    }

    fn insert(&mut self, name: &str, topic: String) {
        self.sensors.insert(
            name.to_string(),
            LocalSensor {
                name: name.to_string(),
                topic,
                value: None,
            },
        );
    }

    /// Record a new reading and return the sample to publish.
    ///
    /// Unlike settings and remote sensors there is no change detection: a
    /// live instrument reading is broadcast every sample, equal or not. The
    /// returned sample is published non-retained by the sync layer.
    pub fn update(
        &mut self,
        name: &str,
        value: impl Into<SettingValue>,
    ) -> Result<Sample, SettingsError> {
        let sensor = self
            .sensors
            .get_mut(name)
            .ok_or_else(|| SettingsError::UnknownSensor(name.to_string()))?;

        let value = value.into();
        let payload = value.to_text();
        sensor.value = Some(value);
        Ok(Sample {
            topic: format!("{}/value", sensor.topic),
            payload,
        })
    }

    pub fn sensor(&self, name: &str) -> Option<&LocalSensor> {
        self.sensors.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalSensor> {
        self.sensors.values()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Empty the registry. Intended for tests.
    pub fn reset(&mut self) {
        self.sensors.clear();
    }
}
