use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One monthly reading as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Reading {
    #[schemars(description = "Metered volume in m³ for the month")]
    Volume(f64),

    #[schemars(description = "No reading was taken for the month (null). Distinct from a confirmed zero.")]
    Missing,

    #[schemars(description = "Any non-numeric value. Kept so validation can report it.")]
    Malformed(Value),
}

impl Reading {
    /// The numeric volume, if this is a finite number.
    pub fn volume(&self) -> Option<f64> {
        match self {
            Reading::Volume(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Reading::Missing)
    }

    /// Contribution to a sum: missing and malformed readings count as zero.
    pub fn summable(&self) -> f64 {
        self.volume().unwrap_or(0.0)
    }

    /// Name of the offending type for non-numeric readings.
    pub fn type_name(&self) -> &'static str {
        match self {
            Reading::Volume(v) if v.is_finite() => "number",
            Reading::Volume(_) => "non-finite number",
            Reading::Missing => "null",
            Reading::Malformed(Value::Bool(_)) => "boolean",
            Reading::Malformed(Value::String(_)) => "string",
            Reading::Malformed(Value::Array(_)) => "array",
            Reading::Malformed(Value::Object(_)) => "object",
            Reading::Malformed(Value::Number(_)) => "number",
            Reading::Malformed(Value::Null) => "null",
        }
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        Reading::Volume(value)
    }
}

impl From<Option<f64>> for Reading {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Reading::Missing, Reading::Volume)
    }
}

/// A meter row in the shape the data source supplies it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RawMeterRow {
    #[schemars(description = "Human readable meter name, e.g. 'ZONE 8 (Bulk Zone 8)'. Required.")]
    pub meter_label: String,

    #[serde(default)]
    #[schemars(description = "Utility account number. Used as the meter id when present.")]
    pub account_number: Option<String>,

    #[serde(default, alias = "level")]
    #[schemars(
        description = "Hierarchy level token: L1 (main source), L2 (zone bulk), L3 (building/villa), L4 (apartment/end user) or DC (direct connection). Unknown tokens are kept and simply match no level."
    )]
    pub label: Option<String>,

    #[serde(default)]
    #[schemars(description = "Free-text zone name, e.g. 'Zone_03_(A)'")]
    pub zone: Option<String>,

    #[serde(default, rename = "type", alias = "usage_type")]
    #[schemars(description = "Free-text usage type, e.g. 'Residential (Villa)', 'IRR_Servies', 'Retail'")]
    pub usage_type: Option<String>,

    #[serde(default)]
    #[schemars(description = "Label of the upstream meter feeding this one")]
    pub parent_meter: Option<String>,

    #[serde(flatten)]
    #[schemars(
        description = "One column per month key (e.g. jan_25). Values are numbers or null; other columns are ignored."
    )]
    pub readings: BTreeMap<String, Reading>,
}

impl RawMeterRow {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(RawMeterRow)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn rows_from_json(json: &str) -> Result<Vec<RawMeterRow>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
