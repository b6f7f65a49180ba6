//! # trellis-core
//!
//! Core settings and sensor model for the trellis device agent.
//!
//! This crate provides:
//! - Typed setting values with validation and casting
//! - Devices that reconcile compiled-in defaults against the persisted store
//! - Registries for devices and for local/remote sensors
//! - Topic pattern parsing and placeholder matching
//! - The persistent key-value store boundary with in-memory and file-backed
//!   implementations
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and embedded targets. Broker
//! synchronization lives in `trellis-sync`.

pub mod device;
pub mod error;
pub mod sensor;
pub mod setting;
pub mod store;
pub mod topic;
pub mod value;

pub use device::{Device, DevicesRegistry};
pub use error::SettingsError;
pub use sensor::{
    LocalSensor, LocalSensorsRegistry, RemoteSensor, RemoteSensorsRegistry, Sample, SensorHook,
};
pub use setting::{Setting, Settings, UpdateHook};
pub use store::{FileStore, MemoryStore, SettingsStore, StoreError};
pub use topic::{PatternError, TopicPattern};
pub use value::{SettingKind, SettingValue};
