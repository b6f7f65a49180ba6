//! Setting value types and casting.
//!
//! A setting holds one of three primitive kinds: text, integer or real. The
//! kind is fixed when the setting is created; every later update is cast to
//! it. The persisted store and the broker both carry values as text, so the
//! canonical text rendering here is also the wire format.

use crate::error::SettingsError;
use std::fmt;

/// The declared kind of a setting value.
///
/// The store names (`str`, `int`, `float`) are the discriminators written
/// into persisted records and published on the `.../type` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Text,
    Integer,
    Real,
}

impl SettingKind {
    /// The discriminator name used in the persisted store.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKind::Text => "str",
            SettingKind::Integer => "int",
            SettingKind::Real => "float",
        }
    }

    /// Parse a stored discriminator, rejecting anything outside the fixed set.
    pub fn parse(name: &str) -> Result<Self, SettingsError> {
        match name {
            "str" => Ok(SettingKind::Text),
            "int" => Ok(SettingKind::Integer),
            "float" => Ok(SettingKind::Real),
            other => Err(SettingsError::UnknownKind(other.to_string())),
        }
    }
}

impl fmt::Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single typed value as held by a setting or sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl SettingValue {
    /// The kind of this value.
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Text(_) => SettingKind::Text,
            SettingValue::Integer(_) => SettingKind::Integer,
            SettingValue::Real(_) => SettingKind::Real,
        }
    }

    /// The canonical text rendering used in the store and on the wire.
    pub fn to_text(&self) -> String {
        match self {
            SettingValue::Text(s) => s.clone(),
            SettingValue::Integer(i) => i.to_string(),
            SettingValue::Real(f) => f.to_string(),
        }
    }

    /// Cast this value to the given kind.
    ///
    /// Anything casts to text. Text casts to integer or real by trimmed
    /// parse. A real casts to integer by truncation toward zero; a
    /// non-finite real does not. An integer casts to real exactly.
    pub fn cast_to(self, kind: SettingKind) -> Result<Self, SettingsError> {
        match kind {
            SettingKind::Text => Ok(SettingValue::Text(self.to_text())),
            SettingKind::Integer => match self {
                SettingValue::Integer(_) => Ok(self),
                SettingValue::Real(f) if f.is_finite() => {
                    Ok(SettingValue::Integer(f.trunc() as i64))
                }
                other => {
                    let text = other.to_text();
                    text.trim().parse::<i64>().map(SettingValue::Integer).map_err(|_| {
                        SettingsError::InvalidValue { value: text, kind }
                    })
                }
            },
            SettingKind::Real => match self {
                SettingValue::Real(_) => Ok(self),
                SettingValue::Integer(i) => Ok(SettingValue::Real(i as f64)),
                SettingValue::Text(s) => {
                    s.trim().parse::<f64>().map(SettingValue::Real).map_err(|_| {
                        SettingsError::InvalidValue { value: s, kind }
                    })
                }
            },
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::Text(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::Text(s)
    }
}

impl From<i64> for SettingValue {
    fn from(i: i64) -> Self {
        SettingValue::Integer(i)
    }
}

impl From<i32> for SettingValue {
    fn from(i: i32) -> Self {
        SettingValue::Integer(i64::from(i))
    }
}

impl From<f64> for SettingValue {
    fn from(f: f64) -> Self {
        SettingValue::Real(f)
    }
}
