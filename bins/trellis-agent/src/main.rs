mod ntp;

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trellis_core::{
    DevicesRegistry, FileStore, LocalSensorsRegistry, RemoteSensorsRegistry, Setting,
};
use trellis_sync::{AgentConfig, Bridge, PublishError, Publisher, Router};

/// Publisher capability backed by the rumqttc client.
struct MqttPublisher {
    client: AsyncClient,
}

impl Publisher for MqttPublisher {
    fn publish(
        &self,
        topic: String,
        payload: String,
        retain: bool,
    ) -> BoxFuture<'_, Result<(), PublishError>> {
        let client = self.client.clone();
        Box::pin(async move {
            client
                .publish(topic, QoS::AtLeastOnce, retain, payload)
                .await
                .map_err(|e| PublishError::Failed(e.to_string()))
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,trellis_sync=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("trellis agent starting...");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "trellis.json".to_string());
    let config = AgentConfig::load(Path::new(&config_path))?;
    let store = Arc::new(FileStore::open(config.store_path())?);
    info!(
        "settings store at {}, broker {}:{}",
        store.path().display(),
        config.broker.host,
        config.broker.port
    );

    // Compiled-in device and sensor definitions. Swap these for the hardware
    // attached to your build; settings changed over the broker or found in
    // the store survive restarts either way.
    let mut devices = DevicesRegistry::new(store);
    devices.create_device(
        "water_pump",
        vec![
            Setting::new(
                "duty_cycle",
                0.3,
                "Fraction of each cycle the pump is active.",
            )?,
            Setting::new("duty_u16", 8192, "Raw PWM duty value for the pump driver.")?,
        ],
    )?;
    if let Some(setting) = devices
        .device_mut("water_pump")
        .and_then(|d| d.settings_mut().get_mut("duty_cycle"))
    {
        setting.set_on_update(Box::new(|value| {
            info!("water pump duty cycle now {}", value);
        }));
    }

    let mut remote_sensors = RemoteSensorsRegistry::new(config.topics.sensors_root.clone());
    remote_sensors.register("inside_temp");
    remote_sensors.set_on_update(
        "inside_temp",
        Box::new(|value| {
            info!("inside temperature reading: {}", value);
        }),
    )?;

    let mut local_sensors = LocalSensorsRegistry::new(config.topics.sensors_root.clone());
    local_sensors.register("uptime_secs");

    let bridge = Arc::new(Bridge::new(
        Arc::new(Mutex::new(devices)),
        Arc::new(Mutex::new(remote_sensors)),
        Arc::new(Mutex::new(local_sensors)),
        config.topics.clone(),
    ));

    // Routes are fixed from here on; devices or sensors registered later
    // would not be reachable over the broker.
    let router = bridge.router()?;

    let mut options = MqttOptions::new(
        config.broker.client_id.clone(),
        config.broker.host.clone(),
        config.broker.port,
    );
    options.set_keep_alive(Duration::from_secs(config.broker.keep_alive_secs));
    if let (Some(username), Some(password)) = (
        config.broker.username.clone(),
        config.broker.password.clone(),
    ) {
        options.set_credentials(username, password);
    }

    let (client, event_loop) = AsyncClient::new(options, 100);
    let publisher = Arc::new(MqttPublisher {
        client: client.clone(),
    });

    for filter in bridge.subscriptions() {
        client.subscribe(filter, QoS::AtLeastOnce).await?;
    }

    // Demo sampler: report the agent's uptime as a local sensor so the
    // outbound path is visible on the broker.
    let sampler_handle = tokio::spawn(sample_uptime(bridge.clone(), publisher.clone()));

    let dispatch_handle = tokio::spawn(run_event_loop(
        event_loop,
        router,
        bridge.clone(),
        publisher.clone(),
    ));

    info!("trellis agent ready");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = dispatch_handle => {
            warn!("broker event loop stopped");
        }
        _ = sampler_handle => {
            warn!("uptime sampler stopped");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Drive the broker connection.
///
/// Inbound publishes are dispatched in receipt order, one at a time; a
/// handler finishes before the next message is dispatched. Every time the
/// connection comes up the full settings state is announced and a
/// best-effort network time lookup is started.
async fn run_event_loop(
    mut event_loop: EventLoop,
    router: Router,
    bridge: Arc<Bridge>,
    publisher: Arc<MqttPublisher>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("broker connection established");
                let bridge = bridge.clone();
                let publisher = publisher.clone();
                tokio::spawn(async move {
                    bridge.on_broker_connect(publisher.as_ref()).await;
                });
                tokio::spawn(ntp::sync_clock());
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload);
                router.dispatch(&publish.topic, &payload);
            }
            Ok(_) => {}
            Err(e) => {
                error!("broker connection error: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Publish the agent uptime every 30 seconds.
async fn sample_uptime(bridge: Arc<Bridge>, publisher: Arc<MqttPublisher>) {
    let started = tokio::time::Instant::now();
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        let uptime = started.elapsed().as_secs() as i64;
        if let Err(e) = bridge
            .update_local_sensor("uptime_secs", uptime, publisher.as_ref())
            .await
        {
            warn!("failed to publish uptime sample: {}", e);
        }
    }
}
