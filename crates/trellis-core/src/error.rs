//! Error taxonomy for the settings core.
//!
//! Construction-time errors (invalid names, duplicates, cast failures while
//! reconciling persisted state) abort the construction that raised them; no
//! partially built device ever reaches a registry. Update-path errors are
//! returned to the caller and are only swallowed at the inbound dispatch
//! boundary in the sync layer.

use crate::store::StoreError;
use crate::value::SettingKind;
use thiserror::Error;

/// Errors produced by the settings, device and sensor registries.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A device or setting name contains the reserved `.` character.
    #[error("invalid name '{0}': character '.' is not allowed")]
    InvalidName(String),

    /// A device with this name is already registered.
    #[error("device '{0}' already exists")]
    DuplicateDevice(String),

    /// A setting name appears more than once within one device.
    #[error("setting '{0}' is defined more than once")]
    DuplicateSetting(String),

    /// No device registered under this name.
    #[error("device '{0}' not found")]
    UnknownDevice(String),

    /// The device exists but has no setting with this name.
    #[error("setting '{setting}' not found for device '{device}'")]
    UnknownSetting { device: String, setting: String },

    /// No sensor registered under this name.
    #[error("sensor '{0}' not found")]
    UnknownSensor(String),

    /// A value could not be cast to the declared setting kind.
    #[error("cannot convert value '{value}' to type '{kind}'")]
    InvalidValue { value: String, kind: SettingKind },

    /// A persisted record is missing required fields or has the wrong shape.
    #[error("malformed persisted record at '{0}'")]
    InvalidRecord(String),

    /// A stored type discriminator is not one of `str`, `int`, `float`.
    #[error("unknown setting type '{0}' (expected str, int or float)")]
    UnknownKind(String),

    /// The persistent store failed underneath a read or write.
    #[error(transparent)]
    Store(#[from] StoreError),
}
