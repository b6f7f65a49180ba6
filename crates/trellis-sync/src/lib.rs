//! # trellis-sync
//!
//! Broker synchronization layer for trellis.
//!
//! This crate connects the runtime-agnostic registries from `trellis-core`
//! to a publish/subscribe broker:
//! - `Publisher`, the capability the concrete broker client provides
//! - `Router`, the fixed inbound topic route table
//! - `Bridge`, the application context wiring registries to routes, the
//!   on-connect announcement and local sensor publishing
//! - configuration types loaded at startup
//!
//! The broker client itself (rumqttc on Linux) lives in the agent binary.

pub mod bridge;
pub mod config;
pub mod publisher;
pub mod router;

pub use bridge::{Bridge, SyncError};
pub use config::{AgentConfig, BrokerConfig, ConfigError, TopicConfig};
pub use publisher::{PublishError, Publisher};
pub use router::{Handler, Router};
