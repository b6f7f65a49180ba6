//! Integration tests for the broker synchronization layer.
//!
//! These tests wire real registries to the router and bridge and drive them
//! with inbound messages and an in-process recording publisher, verifying
//! the end-to-end flows without a broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::json;

use trellis_core::{
    DevicesRegistry, LocalSensorsRegistry, MemoryStore, RemoteSensorsRegistry, Setting,
    SettingValue,
};
use trellis_sync::{Bridge, PublishError, Publisher, TopicConfig};

/// Publisher capturing every message in memory.
#[derive(Default)]
struct RecordingPublisher {
    messages: Mutex<Vec<(String, String, bool)>>,
}

impl RecordingPublisher {
    fn messages(&self) -> Vec<(String, String, bool)> {
        self.messages.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(
        &self,
        topic: String,
        payload: String,
        retain: bool,
    ) -> BoxFuture<'_, Result<(), PublishError>> {
        self.messages.lock().unwrap().push((topic, payload, retain));
        Box::pin(async { Ok(()) })
    }
}

/// Publisher failing for one topic and recording the rest.
struct FlakyPublisher {
    failing_topic: String,
    inner: RecordingPublisher,
}

impl Publisher for FlakyPublisher {
    fn publish(
        &self,
        topic: String,
        payload: String,
        retain: bool,
    ) -> BoxFuture<'_, Result<(), PublishError>> {
        if topic == self.failing_topic {
            return Box::pin(async { Err(PublishError::Failed("simulated".to_string())) });
        }
        self.inner.publish(topic, payload, retain)
    }
}

/// Build a bridge around a water pump device, one remote and one local
/// sensor, the way the agent wires things at startup.
fn test_bridge() -> (Bridge, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());

    let mut devices = DevicesRegistry::new(store.clone());
    devices
        .create_device(
            "water_pump",
            vec![
                Setting::new(
                    "duty_cycle",
                    0.3,
                    "Fraction of each cycle the pump is active.",
                )
                .unwrap(),
                Setting::new("duty_u16", 8192, "Raw PWM duty value.").unwrap(),
            ],
        )
        .unwrap();

    let mut remote_sensors = RemoteSensorsRegistry::new("sensors");
    remote_sensors.register("inside_temp");

    let mut local_sensors = LocalSensorsRegistry::new("sensors");
    local_sensors.register("loop_time_ms");

    let bridge = Bridge::new(
        Arc::new(Mutex::new(devices)),
        Arc::new(Mutex::new(remote_sensors)),
        Arc::new(Mutex::new(local_sensors)),
        TopicConfig::default(),
    );
    (bridge, store)
}

#[tokio::test]
async fn test_inbound_device_update_reaches_registry_and_store() {
    let (bridge, store) = test_bridge();
    let router = bridge.router().unwrap();

    assert!(router.dispatch("devices/water_pump/duty_cycle/value", "12.5"));

    let devices = bridge.devices();
    let devices = devices.lock().unwrap();
    let setting = devices
        .device("water_pump")
        .unwrap()
        .settings()
        .get("duty_cycle")
        .unwrap();
    assert_eq!(setting.value(), &SettingValue::Real(12.5));

    assert_eq!(
        store.read("water_pump.duty_cycle.value").unwrap(),
        Some(json!("12.5"))
    );
}

#[tokio::test]
async fn test_inbound_message_for_unknown_device_is_dropped() {
    let (bridge, store) = test_bridge();
    let router = bridge.router().unwrap();
    let before = store.load().unwrap();

    // routed, but the target does not exist; the message is dropped quietly
    assert!(router.dispatch("devices/heater/target/value", "42"));
    assert_eq!(store.load().unwrap(), before);
}

#[tokio::test]
async fn test_malformed_payload_does_not_kill_the_dispatch_loop() {
    let (bridge, _store) = test_bridge();
    let router = bridge.router().unwrap();

    // "fast" cannot be cast to the integer setting; the error stays inside
    // the dispatch boundary
    assert!(router.dispatch("devices/water_pump/duty_u16/value", "fast"));

    // the loop is still alive and a good message goes through
    assert!(router.dispatch("devices/water_pump/duty_u16/value", "4096"));

    let devices = bridge.devices();
    let devices = devices.lock().unwrap();
    let setting = devices
        .device("water_pump")
        .unwrap()
        .settings()
        .get("duty_u16")
        .unwrap();
    assert_eq!(setting.value(), &SettingValue::Integer(4096));
}

#[tokio::test]
async fn test_unmatched_topic_is_silently_dropped() {
    let (bridge, _store) = test_bridge();
    let router = bridge.router().unwrap();

    assert!(!router.dispatch("somewhere/else/entirely", "payload"));
}

#[tokio::test]
async fn test_remote_sensor_hook_fires_on_change_only() {
    let (bridge, _store) = test_bridge();

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    {
        let sensors = bridge.remote_sensors();
        let mut sensors = sensors.lock().unwrap();
        sensors
            .set_on_update(
                "inside_temp",
                Box::new(|_| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
    }

    let router = bridge.router().unwrap();
    router.dispatch("sensors/inside_temp/value", "21.5");
    router.dispatch("sensors/inside_temp/value", "21.5");
    router.dispatch("sensors/inside_temp/value", "21.6");

    assert_eq!(CALLS.load(Ordering::SeqCst), 2);

    let sensors = bridge.remote_sensors();
    let sensors = sensors.lock().unwrap();
    assert_eq!(
        sensors.sensor("inside_temp").unwrap().value(),
        Some(&SettingValue::Text("21.6".to_string()))
    );
}

#[tokio::test]
async fn test_remote_sensor_with_custom_topic_is_routable() {
    let (bridge, _store) = test_bridge();
    {
        let sensors = bridge.remote_sensors();
        let mut sensors = sensors.lock().unwrap();
        sensors.register_with_topic("outside_temp", "garden/station/temperature");
    }

    // the route table is built after registration, at startup
    let router = bridge.router().unwrap();
    assert!(router.dispatch("garden/station/temperature/value", "18.2"));

    let sensors = bridge.remote_sensors();
    let sensors = sensors.lock().unwrap();
    assert_eq!(
        sensors.sensor("outside_temp").unwrap().value(),
        Some(&SettingValue::Text("18.2".to_string()))
    );
}

#[tokio::test]
async fn test_subscriptions_cover_route_table() {
    let (bridge, _store) = test_bridge();
    {
        let sensors = bridge.remote_sensors();
        let mut sensors = sensors.lock().unwrap();
        sensors.register_with_topic("outside_temp", "garden/station/temperature");
    }

    let filters = bridge.subscriptions();
    assert!(filters.contains(&"devices/+/+/value".to_string()));
    assert!(filters.contains(&"sensors/+/value".to_string()));
    assert!(filters.contains(&"garden/station/temperature/value".to_string()));
}

#[tokio::test]
async fn test_connect_announces_three_retained_messages_per_setting() {
    let (bridge, _store) = test_bridge();
    let publisher = RecordingPublisher::default();

    bridge.on_broker_connect(&publisher).await;

    let messages = publisher.messages();
    // two settings, three messages each
    assert_eq!(messages.len(), 6);
    assert!(messages.iter().all(|(_, _, retain)| *retain));

    let find = |topic: &str| {
        messages
            .iter()
            .find(|(t, _, _)| t == topic)
            .map(|(_, payload, _)| payload.clone())
    };

    assert_eq!(
        find("devices/water_pump/duty_cycle/description").as_deref(),
        Some("Fraction of each cycle the pump is active.")
    );
    assert_eq!(
        find("devices/water_pump/duty_cycle/type").as_deref(),
        Some("float")
    );
    assert_eq!(
        find("devices/water_pump/duty_cycle/value/reported").as_deref(),
        Some("0.3")
    );
    assert_eq!(find("devices/water_pump/duty_u16/type").as_deref(), Some("int"));
}

#[tokio::test]
async fn test_connect_announcement_survives_a_failing_publish() {
    let (bridge, _store) = test_bridge();
    let publisher = FlakyPublisher {
        failing_topic: "devices/water_pump/duty_cycle/type".to_string(),
        inner: RecordingPublisher::default(),
    };

    bridge.on_broker_connect(&publisher).await;

    // the other five publishes were still attempted
    assert_eq!(publisher.inner.messages().len(), 5);
}

#[tokio::test]
async fn test_local_sensor_publishes_every_sample() {
    let (bridge, _store) = test_bridge();
    let publisher = RecordingPublisher::default();

    bridge
        .update_local_sensor("loop_time_ms", 130, &publisher)
        .await
        .unwrap();
    bridge
        .update_local_sensor("loop_time_ms", 130, &publisher)
        .await
        .unwrap();

    let messages = publisher.messages();
    assert_eq!(messages.len(), 2);
    for (topic, payload, retain) in &messages {
        assert_eq!(topic, "sensors/loop_time_ms/value");
        assert_eq!(payload, "130");
        assert!(!retain);
    }
}

#[tokio::test]
async fn test_local_sensor_unknown_name_is_an_error() {
    let (bridge, _store) = test_bridge();
    let publisher = RecordingPublisher::default();

    let result = bridge.update_local_sensor("missing", 1, &publisher).await;
    assert!(result.is_err());
    assert!(publisher.messages().is_empty());
}

#[tokio::test]
async fn test_settings_survive_a_restart() {
    let store = Arc::new(MemoryStore::new());

    // first process lifetime: create, then mutate over the broker path
    {
        let mut devices = DevicesRegistry::new(store.clone());
        devices
            .create_device(
                "water_pump",
                vec![Setting::new("duty_cycle", 0.3, "Active fraction.").unwrap()],
            )
            .unwrap();

        let bridge = Bridge::new(
            Arc::new(Mutex::new(devices)),
            Arc::new(Mutex::new(RemoteSensorsRegistry::new("sensors"))),
            Arc::new(Mutex::new(LocalSensorsRegistry::new("sensors"))),
            TopicConfig::default(),
        );
        let router = bridge.router().unwrap();
        router.dispatch("devices/water_pump/duty_cycle/value", "0.8");
    }

    // second process lifetime: the persisted value overrides the default
    let mut devices = DevicesRegistry::new(store);
    devices
        .create_device(
            "water_pump",
            vec![Setting::new("duty_cycle", 0.3, "Active fraction.").unwrap()],
        )
        .unwrap();

    let setting_value = devices
        .device("water_pump")
        .unwrap()
        .settings()
        .get("duty_cycle")
        .unwrap()
        .value()
        .clone();
    assert_eq!(setting_value, SettingValue::Real(0.8));
}
