//! Wiring between the registries and the broker.
//!
//! The bridge owns shared handles to the three registries, builds the fixed
//! route table for inbound messages, mirrors the full settings state outward
//! when the broker connection comes up, and publishes local sensor samples.
//!
//! Registry mutation normally happens from the single dispatch loop, so the
//! mutexes see no contention; they exist because a tokio runtime may move
//! that loop across threads. Locks are never held across await points.

use crate::config::TopicConfig;
use crate::publisher::{PublishError, Publisher};
use crate::router::Router;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};
use trellis_core::{
    DevicesRegistry, LocalSensorsRegistry, PatternError, RemoteSensorsRegistry, SettingsError,
    SettingValue,
};

/// Errors from bridge operations that touch both registries and the broker.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Application context connecting the registries to the broker.
pub struct Bridge {
    devices: Arc<Mutex<DevicesRegistry>>,
    remote_sensors: Arc<Mutex<RemoteSensorsRegistry>>,
    local_sensors: Arc<Mutex<LocalSensorsRegistry>>,
    topics: TopicConfig,
}

impl Bridge {
    pub fn new(
        devices: Arc<Mutex<DevicesRegistry>>,
        remote_sensors: Arc<Mutex<RemoteSensorsRegistry>>,
        local_sensors: Arc<Mutex<LocalSensorsRegistry>>,
        topics: TopicConfig,
    ) -> Self {
        Self {
            devices,
            remote_sensors,
            local_sensors,
            topics,
        }
    }

    pub fn devices(&self) -> Arc<Mutex<DevicesRegistry>> {
        self.devices.clone()
    }

    pub fn remote_sensors(&self) -> Arc<Mutex<RemoteSensorsRegistry>> {
        self.remote_sensors.clone()
    }

    pub fn local_sensors(&self) -> Arc<Mutex<LocalSensorsRegistry>> {
        self.local_sensors.clone()
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }

    /// Build the fixed route table.
    ///
    /// Called once at startup, after every device and sensor has been
    /// registered: one route for device setting updates, one for
    /// name-derived sensor topics, and one per remote sensor living under a
    /// foreign topic namespace.
    pub fn router(&self) -> Result<Router, PatternError> {
        let mut router = Router::new();

        let devices = self.devices.clone();
        router.route(
            &format!("{}/<device>/<setting>/value", self.topics.devices_root),
            Box::new(move |bindings, payload| {
                let mut devices = devices.lock().expect("devices registry lock poisoned");
                devices.update_device_setting(&bindings[0], &bindings[1], payload)?;
                Ok(())
            }),
        )?;

        let sensors = self.remote_sensors.clone();
        router.route(
            &format!("{}/<sensor>/value", self.topics.sensors_root),
            Box::new(move |bindings, payload| {
                let mut sensors = sensors.lock().expect("remote sensors lock poisoned");
                sensors.update(&bindings[0], payload)?;
                Ok(())
            }),
        )?;

        for (name, topic) in self.custom_sensor_topics() {
            let sensors = self.remote_sensors.clone();
            router.route(
                &format!("{topic}/value"),
                Box::new(move |_bindings, payload| {
                    let mut sensors = sensors.lock().expect("remote sensors lock poisoned");
                    sensors.update(&name, payload)?;
                    Ok(())
                }),
            )?;
        }

        Ok(router)
    }

    /// Subscription filters matching the route table, using the broker's
    /// single-level `+` wildcard.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut filters = vec![
            format!("{}/+/+/value", self.topics.devices_root),
            format!("{}/+/value", self.topics.sensors_root),
        ];
        filters.extend(
            self.custom_sensor_topics()
                .into_iter()
                .map(|(_, topic)| format!("{topic}/value")),
        );
        filters
    }

    fn custom_sensor_topics(&self) -> Vec<(String, String)> {
        let sensors = self
            .remote_sensors
            .lock()
            .expect("remote sensors lock poisoned");
        sensors
            .iter()
            .filter(|s| s.has_custom_topic())
            .map(|s| (s.name().to_string(), s.topic().to_string()))
            .collect()
    }

    /// Mirror the full settings state to the broker.
    ///
    /// For every device and every setting, three retained messages are
    /// published: `.../description`, `.../type` and `.../value/reported`.
    /// The publishes are issued concurrently and jointly awaited; a slow or
    /// failing publish never blocks the others, and completion is reported
    /// only once every publish has settled. Failures are logged, not
    /// propagated; the broker will be told again on the next connect.
    pub async fn on_broker_connect<P: Publisher + ?Sized>(&self, publisher: &P) {
        let outbound: Vec<(String, String)> = {
            let devices = self.devices.lock().expect("devices registry lock poisoned");
            devices
                .iter()
                .flat_map(|device| {
                    device.settings().iter().flat_map(|setting| {
                        let base = format!(
                            "{}/{}/{}",
                            self.topics.devices_root,
                            device.name(),
                            setting.name()
                        );
                        [
                            (format!("{base}/description"), setting.description().to_string()),
                            (format!("{base}/type"), setting.kind().as_str().to_string()),
                            (format!("{base}/value/reported"), setting.value().to_text()),
                        ]
                    })
                })
                .collect()
        };

        info!("announcing {} retained setting messages", outbound.len());

        let publishes = outbound.into_iter().map(|(topic, payload)| {
            let fut = publisher.publish(topic.clone(), payload, true);
            async move { (topic, fut.await) }
        });

        for (topic, result) in join_all(publishes).await {
            if let Err(e) = result {
                warn!("failed to announce '{}': {}", topic, e);
            }
        }
        debug!("announcement complete");
    }

    /// Record a local sensor reading and publish it.
    ///
    /// Always publishes, even when the new value equals the old one: local
    /// sensors are live instrument readings, broadcast every sample. The
    /// message is not retained.
    pub async fn update_local_sensor<P: Publisher + ?Sized>(
        &self,
        name: &str,
        value: impl Into<SettingValue>,
        publisher: &P,
    ) -> Result<(), SyncError> {
        let sample = {
            let mut sensors = self
                .local_sensors
                .lock()
                .expect("local sensors lock poisoned");
            sensors.update(name, value)?
        };
        publisher.publish(sample.topic, sample.payload, false).await?;
        Ok(())
    }
}
