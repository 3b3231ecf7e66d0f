use crate::classifier::{normalize, Classifier};
use crate::engine::{aggregate, partition_by_level, LevelCounts};
use crate::model::{Level, MeterRecord};
use crate::utils::percentage;
use crate::window::TimeWindow;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage categories that mark an L3 meter as a building bulk rather than an
/// end user.
const BUILDING_BULK_CATEGORIES: [&str; 2] = ["building", "bulk"];

/// Supply-loss figures for one window. Losses may be negative and
/// percentages may leave `[0, 100]`; both are reported as computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeMetrics {
    pub months: Vec<String>,
    pub meter_counts: LevelCounts,

    /// L1 main source
    pub a1: f64,
    /// L2 zone bulks + DC
    pub a2: f64,
    /// L3 (all) + DC
    pub a3_bulk: f64,
    /// L3 end users + L4 + DC
    pub a3_individual: f64,

    pub stage1_loss: f64,
    pub stage2_loss: f64,
    pub stage2_bulk_loss: f64,
    pub stage3_loss: f64,
    pub total_loss: f64,

    pub stage1_loss_percentage: f64,
    pub stage2_loss_percentage: f64,
    pub stage2_bulk_loss_percentage: f64,
    pub stage3_loss_percentage: f64,
    pub total_loss_percentage: f64,
    pub system_efficiency: f64,
}

pub struct LossCascade<'a> {
    usage: &'a Classifier,
}

impl<'a> LossCascade<'a> {
    pub fn new(usage: &'a Classifier) -> Self {
        Self { usage }
    }

    /// An L3 meter feeds an end user only when its usage type resolves to a
    /// category other than building/bulk. Missing or unknown types count as
    /// building bulk.
    pub fn is_building_bulk(&self, record: &MeterRecord) -> bool {
        match self.usage.resolve(record.usage_type.as_deref()) {
            None => true,
            Some(id) => BUILDING_BULK_CATEGORIES.contains(&normalize(id).as_str()),
        }
    }

    pub fn compute(&self, records: &[MeterRecord], window: &TimeWindow) -> CascadeMetrics {
        let groups = partition_by_level(records);

        let (l3_bulk, l3_end_user): (Vec<&MeterRecord>, Vec<&MeterRecord>) = groups
            .l3
            .iter()
            .copied()
            .partition(|r| self.is_building_bulk(r));

        let l1_total = aggregate(groups.l1.iter().copied(), window);
        let l2_total = aggregate(groups.l2.iter().copied(), window);
        let l3_total = aggregate(groups.l3.iter().copied(), window);
        let l3_end_user_total = aggregate(l3_end_user.iter().copied(), window);
        let l4_total = aggregate(groups.l4.iter().copied(), window);
        let dc_total = aggregate(groups.dc.iter().copied(), window);

        let a1 = l1_total;
        let a2 = l2_total + dc_total;
        let a3_bulk = l3_total + dc_total;
        let a3_individual = l3_end_user_total + l4_total + dc_total;

        let stage1_loss = a1 - a2;
        let stage2_loss = a2 - a3_individual;
        let stage2_bulk_loss = a2 - a3_bulk;
        let stage3_loss = a3_bulk - a3_individual;
        let total_loss = stage1_loss + stage2_loss;

        let metrics = CascadeMetrics {
            months: window.keys().to_vec(),
            meter_counts: groups.counts(),
            a1,
            a2,
            a3_bulk,
            a3_individual,
            stage1_loss,
            stage2_loss,
            stage2_bulk_loss,
            stage3_loss,
            total_loss,
            stage1_loss_percentage: percentage(stage1_loss, a1),
            stage2_loss_percentage: percentage(stage2_loss, a2),
            stage2_bulk_loss_percentage: percentage(stage2_bulk_loss, a2),
            stage3_loss_percentage: percentage(stage3_loss, a3_bulk),
            total_loss_percentage: percentage(total_loss, a1),
            system_efficiency: percentage(a3_individual, a1),
        };

        debug!(
            "Cascade over {}: A1={} A2={} A3_bulk={} A3_individual={} ({} building bulk / {} end-user L3 meters)",
            window,
            a1,
            a2,
            a3_bulk,
            a3_individual,
            l3_bulk.len(),
            l3_end_user.len()
        );

        metrics
    }
}

/// Cascade with the built-in usage-type table.
pub fn compute_cascade(records: &[MeterRecord], window: &TimeWindow) -> CascadeMetrics {
    let usage = Classifier::usage_types();
    LossCascade::new(&usage).compute(records, window)
}

/// Zone bulk (L2) inflow against what the zone's L3 meters recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBalance {
    pub zone: String,
    pub bulk_total: f64,
    pub individual_total: f64,
    pub difference: f64,
    pub loss_percentage: f64,
    pub efficiency: f64,
    pub bulk_meter_count: usize,
    pub individual_meter_count: usize,
}

pub fn zone_balance(
    records: &[MeterRecord],
    zone: &str,
    window: &TimeWindow,
    zones: &Classifier,
) -> ZoneBalance {
    let in_zone: Vec<&MeterRecord> = records
        .iter()
        .filter(|r| zones.matches(r.zone.as_deref(), zone))
        .collect();

    let bulk: Vec<&MeterRecord> = in_zone.iter().copied().filter(|r| r.level == Level::L2).collect();
    let individual: Vec<&MeterRecord> = in_zone.iter().copied().filter(|r| r.level == Level::L3).collect();

    let bulk_total = aggregate(bulk.iter().copied(), window);
    let individual_total = aggregate(individual.iter().copied(), window);
    let difference = bulk_total - individual_total;

    ZoneBalance {
        zone: zone.to_string(),
        bulk_total,
        individual_total,
        difference,
        loss_percentage: percentage(difference, bulk_total),
        efficiency: percentage(individual_total, bulk_total),
        bulk_meter_count: bulk.len(),
        individual_meter_count: individual.len(),
    }
}

/// One balance per zone that has a zone bulk meter, keyed by canonical zone
/// id where the catalog knows the zone and by its own spelling otherwise.
pub fn zone_balances(
    records: &[MeterRecord],
    window: &TimeWindow,
    zones: &Classifier,
) -> Vec<ZoneBalance> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();

    for record in records.iter().filter(|r| r.level == Level::L2) {
        let Some(raw) = record.zone.as_deref() else {
            continue;
        };
        let canonical = zones.resolve(Some(raw)).unwrap_or(raw).to_string();
        seen.entry(normalize(&canonical)).or_insert(canonical);
    }

    seen.into_values()
        .map(|zone| zone_balance(records, &zone, window, zones))
        .collect()
}
