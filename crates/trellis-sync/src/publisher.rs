//! The broker publish capability.
//!
//! The concrete broker client (connection handshake, keep-alive, QoS, TLS)
//! lives outside this crate. The sync layer only needs the ability to
//! publish, expressed as a trait the binary implements on top of its MQTT
//! client, and inbound messages, which the binary feeds into the router.

use futures::future::BoxFuture;
use thiserror::Error;

/// Errors surfaced by the broker client when publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The client is not connected to the broker.
    #[error("broker client disconnected: {0}")]
    Disconnected(String),

    /// The publish itself failed.
    #[error("publish failed: {0}")]
    Failed(String),
}

/// Ability to publish a message to the broker.
///
/// `retain` marks the message so new subscribers immediately receive the
/// last known value for the topic.
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        topic: String,
        payload: String,
        retain: bool,
    ) -> BoxFuture<'_, Result<(), PublishError>>;
}
