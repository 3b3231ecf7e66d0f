use crate::schema::Reading;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

static MISSING_READING: Reading = Reading::Missing;

/// Position of a meter in the supply hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    /// Main source meter
    L1,
    /// Zone bulk meter
    L2,
    /// Building bulk or villa meter
    L3,
    /// Apartment / end-user meter
    L4,
    /// Direct connection, bypassing zone bulk metering
    DC,
    /// Any other token. Matches no partition.
    Unrecognized(String),
}

impl Level {
    pub fn parse(token: &str) -> Self {
        match token.trim().to_uppercase().as_str() {
            "L1" => Level::L1,
            "L2" => Level::L2,
            "L3" => Level::L3,
            "L4" => Level::L4,
            "DC" => Level::DC,
            _ => Level::Unrecognized(token.trim().to_string()),
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Level::Unrecognized(_))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::L1 => write!(f, "L1"),
            Level::L2 => write!(f, "L2"),
            Level::L3 => write!(f, "L3"),
            Level::L4 => write!(f, "L4"),
            Level::DC => write!(f, "DC"),
            Level::Unrecognized(raw) => write!(f, "{}", raw),
        }
    }
}

/// Canonical shape of one meter for a snapshot. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterRecord {
    pub id: String,
    pub label: String,
    pub level: Level,
    pub zone: Option<String>,
    pub usage_type: Option<String>,
    pub parent_meter: Option<String>,
    pub readings: BTreeMap<String, Reading>,
}

impl MeterRecord {
    pub fn new(id: impl Into<String>, level: Level) -> Self {
        let id = id.into();
        Self {
            label: id.clone(),
            id,
            level,
            zone: None,
            usage_type: None,
            parent_meter: None,
            readings: BTreeMap::new(),
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_usage_type(mut self, usage_type: impl Into<String>) -> Self {
        self.usage_type = Some(usage_type.into());
        self
    }

    pub fn with_reading(mut self, month_key: impl Into<String>, reading: impl Into<Reading>) -> Self {
        self.readings.insert(month_key.into(), reading.into());
        self
    }

    /// The reading for a month. An absent column is the same as null.
    pub fn reading(&self, month_key: &str) -> &Reading {
        self.readings.get(month_key).unwrap_or(&MISSING_READING)
    }
}
