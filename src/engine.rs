//! Aggregation primitives. Everything above this layer (cascade, zone balance,
//! validation) is built from [`record_total`] and [`month_total`].
//!
//! These functions never filter or reorder: selecting records is the
//! caller's job. Missing and malformed readings contribute zero; no rounding
//! is applied.

use crate::classifier::Classifier;
use crate::model::{Level, MeterRecord};
use crate::window::TimeWindow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const UNCLASSIFIED: &str = "Unclassified";

pub fn record_total(record: &MeterRecord, window: &TimeWindow) -> f64 {
    window
        .keys()
        .iter()
        .fold(0.0, |acc, key| acc + record.reading(key).summable())
}

pub fn aggregate<'a, I>(records: I, window: &TimeWindow) -> f64
where
    I: IntoIterator<Item = &'a MeterRecord>,
{
    records
        .into_iter()
        .fold(0.0, |acc, record| acc + record_total(record, window))
}

pub fn month_total<'a, I>(records: I, month_key: &str) -> f64
where
    I: IntoIterator<Item = &'a MeterRecord>,
{
    records
        .into_iter()
        .fold(0.0, |acc, record| acc + record.reading(month_key).summable())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub month: String,
    pub label: String,
    pub total: f64,
}

pub fn monthly_totals<'a, I>(records: I, window: &TimeWindow) -> Vec<MonthlyTotal>
where
    I: IntoIterator<Item = &'a MeterRecord> + Clone,
{
    window
        .months()
        .iter()
        .zip(window.keys())
        .map(|(month, key)| MonthlyTotal {
            month: key.clone(),
            label: month.label(),
            total: month_total(records.clone(), key),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub l1: usize,
    pub l2: usize,
    pub l3: usize,
    pub l4: usize,
    pub dc: usize,
    pub unrecognized: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LevelGroups<'a> {
    pub l1: Vec<&'a MeterRecord>,
    pub l2: Vec<&'a MeterRecord>,
    pub l3: Vec<&'a MeterRecord>,
    pub l4: Vec<&'a MeterRecord>,
    pub dc: Vec<&'a MeterRecord>,
    pub unrecognized: Vec<&'a MeterRecord>,
}

impl<'a> LevelGroups<'a> {
    pub fn counts(&self) -> LevelCounts {
        LevelCounts {
            l1: self.l1.len(),
            l2: self.l2.len(),
            l3: self.l3.len(),
            l4: self.l4.len(),
            dc: self.dc.len(),
            unrecognized: self.unrecognized.len(),
            total: self.l1.len()
                + self.l2.len()
                + self.l3.len()
                + self.l4.len()
                + self.dc.len()
                + self.unrecognized.len(),
        }
    }
}

pub fn partition_by_level(records: &[MeterRecord]) -> LevelGroups<'_> {
    let mut groups = LevelGroups::default();

    for record in records {
        match record.level {
            Level::L1 => groups.l1.push(record),
            Level::L2 => groups.l2.push(record),
            Level::L3 => groups.l3.push(record),
            Level::L4 => groups.l4.push(record),
            Level::DC => groups.dc.push(record),
            Level::Unrecognized(_) => groups.unrecognized.push(record),
        }
    }

    groups
}

/// Optional usage-type, zone and level constraints, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterFilter {
    pub usage_type: Option<String>,
    pub zone: Option<String>,
    pub level: Option<Level>,
}

impl MeterFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage_type(mut self, usage_type: impl Into<String>) -> Self {
        self.usage_type = Some(usage_type.into());
        self
    }

    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn accepts(&self, record: &MeterRecord, usage: &Classifier, zones: &Classifier) -> bool {
        if let Some(level) = &self.level {
            if record.level != *level {
                return false;
            }
        }
        if let Some(usage_type) = &self.usage_type {
            if !usage.matches(record.usage_type.as_deref(), usage_type) {
                return false;
            }
        }
        if let Some(zone) = &self.zone {
            if !zones.matches(record.zone.as_deref(), zone) {
                return false;
            }
        }
        true
    }
}

pub fn monthly_breakdown(
    records: &[MeterRecord],
    window: &TimeWindow,
    filter: &MeterFilter,
    usage: &Classifier,
    zones: &Classifier,
) -> Vec<MonthlyTotal> {
    let selected: Vec<&MeterRecord> = records
        .iter()
        .filter(|r| filter.accepts(r, usage, zones))
        .collect();

    monthly_totals(selected.iter().copied(), window)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeConsumption {
    pub category: String,
    pub total: f64,
    pub meter_count: usize,
}

/// Totals per resolved usage category, in category-name order.
pub fn consumption_by_type(
    records: &[MeterRecord],
    window: &TimeWindow,
    usage: &Classifier,
) -> Vec<TypeConsumption> {
    let mut grouped: BTreeMap<String, Vec<&MeterRecord>> = BTreeMap::new();

    for record in records {
        let category = usage
            .resolve(record.usage_type.as_deref())
            .unwrap_or(UNCLASSIFIED)
            .to_string();
        grouped.entry(category).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(category, meters)| TypeConsumption {
            total: aggregate(meters.iter().copied(), window),
            meter_count: meters.len(),
            category,
        })
        .collect()
}
