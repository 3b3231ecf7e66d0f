//! # Water Balance
//!
//! A library for water-balance accounting over a snapshot of utility-meter
//! readings organised in a supply hierarchy.
//!
//! ## Core Concepts
//!
//! - **Levels**: L1 main source, L2 zone bulk, L3 building bulk or villa, L4 apartment / end user,
//!   DC direct connection bypassing zone bulk metering
//! - **Time Window**: An inclusive range of calendar months resolved against the configured month keys
//! - **Loss Cascade**: Volumes at each hand-off (A1, A2, A3) and the losses between them
//! - **Double Verification**: A category's consumption is computed by two independent passes and diffed
//! - **Classification**: Free-text zone and usage-type strings resolved through one table-driven matcher
//!
//! Data-quality findings (null or negative readings, tiers exceeding their parent, mismatched
//! totals) are returned inside reports. Only structural problems such as a bad window, a malformed
//! row or invalid configuration are returned as errors.
//!
//! ## Example
//!
//! ```rust,ignore
//! use water_balance::*;
//!
//! let processor = WaterBalanceProcessor::with_defaults()?;
//! let records = processor.ingest_json(r#"[
//!     {"meter_label": "Main Bulk", "label": "L1", "jan_25": 1000},
//!     {"meter_label": "Zone 8 Bulk", "label": "L2", "zone": "Zone_08", "jan_25": 900},
//!     {"meter_label": "Building D44", "label": "L3", "zone": "Zone_08", "jan_25": 850},
//!     {"meter_label": "Apartment 1", "label": "L4", "type": "Residential (Apart)", "jan_25": 800}
//! ]"#)?;
//!
//! let output = processor.process(&records, "residential", 0, 0)?;
//! assert_eq!(output.cascade.stage1_loss, 100.0);
//! println!("{}", output.report.to_json()?);
//! ```

pub mod cascade;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod model;
pub mod schema;
pub mod treatment;
pub mod utils;
pub mod validation;
pub mod window;

pub use cascade::{
    compute_cascade, zone_balance, zone_balances, CascadeMetrics, LossCascade, ZoneBalance,
};
pub use classifier::{normalize, CategoryDefinition, Classifier, MatchRule};
pub use config::{BalanceThresholds, EngineConfig, DEFAULT_MONTH_KEYS};
pub use engine::{
    aggregate, consumption_by_type, month_total, monthly_breakdown, monthly_totals,
    partition_by_level, record_total, LevelCounts, LevelGroups, MeterFilter, MonthlyTotal,
    TypeConsumption, UNCLASSIFIED,
};
pub use error::{Result, WaterBalanceError};
pub use ingestion::{convert_rows_to_records, records_from_json};
pub use model::{Level, MeterRecord};
pub use schema::{RawMeterRow, Reading};
pub use treatment::{
    filter_by_period, monthly_treatment_summary, treatment_records_from_json,
    MonthlyTreatmentSummary, TreatmentMetrics, TreatmentRates, TreatmentRecord,
};
pub use utils::*;
pub use validation::{
    check_hierarchy_relationships, comprehensive_validation, cross_check, LevelRelationship,
    RelationshipReport, TypeConsumptionData, ValidationReport, ValidationResult,
    ValidationSummary, WaterBalanceValidator,
};
pub use window::{MonthCalendar, MonthKey, TimeWindow};

use log::{debug, info, warn};
use serde::Serialize;

/// Cascade and validation report for one `(records, category, window)` run.
#[derive(Debug, Clone, Serialize)]
pub struct WaterBalanceOutput {
    pub window: TimeWindow,
    pub cascade: CascadeMetrics,
    pub report: ValidationReport,
}

impl WaterBalanceOutput {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Owns a validated configuration and everything derived from it.
/// Every call is a full recompute over the records it is given.
pub struct WaterBalanceProcessor {
    config: EngineConfig,
    calendar: MonthCalendar,
    usage: Classifier,
    zones: Classifier,
}

impl WaterBalanceProcessor {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let calendar = config.calendar()?;

        debug!(
            "Processor configured with {} months ({}..{})",
            calendar.len(),
            calendar.keys().first().map(String::as_str).unwrap_or(""),
            calendar.keys().last().map(String::as_str).unwrap_or("")
        );

        Ok(Self {
            usage: config.usage_classifier(),
            zones: config.zone_classifier(),
            calendar,
            config,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calendar(&self) -> &MonthCalendar {
        &self.calendar
    }

    pub fn usage_classifier(&self) -> &Classifier {
        &self.usage
    }

    pub fn zone_classifier(&self) -> &Classifier {
        &self.zones
    }

    fn validator(&self) -> WaterBalanceValidator<'_> {
        WaterBalanceValidator::new(&self.usage, &self.config.thresholds)
    }

    pub fn ingest(&self, rows: &[RawMeterRow]) -> Result<Vec<MeterRecord>> {
        convert_rows_to_records(rows, &self.calendar)
    }

    pub fn ingest_json(&self, json: &str) -> Result<Vec<MeterRecord>> {
        records_from_json(json, &self.calendar)
    }

    pub fn window(&self, start: usize, end: usize) -> Result<TimeWindow> {
        self.calendar.resolve(start, end)
    }

    pub fn cascade(&self, records: &[MeterRecord], window: &TimeWindow) -> CascadeMetrics {
        LossCascade::new(&self.usage).compute(records, window)
    }

    pub fn validate_category(
        &self,
        records: &[MeterRecord],
        category: &str,
        window: &TimeWindow,
    ) -> ValidationReport {
        self.validator()
            .comprehensive_validation(records, category, window)
    }

    pub fn relationships(&self, records: &[MeterRecord], window: &TimeWindow) -> RelationshipReport {
        self.validator().check_hierarchy_relationships(records, window)
    }

    pub fn monthly_breakdown(
        &self,
        records: &[MeterRecord],
        window: &TimeWindow,
        filter: &MeterFilter,
    ) -> Vec<MonthlyTotal> {
        monthly_breakdown(records, window, filter, &self.usage, &self.zones)
    }

    pub fn consumption_by_type(
        &self,
        records: &[MeterRecord],
        window: &TimeWindow,
    ) -> Vec<TypeConsumption> {
        consumption_by_type(records, window, &self.usage)
    }

    pub fn zone_balances(&self, records: &[MeterRecord], window: &TimeWindow) -> Vec<ZoneBalance> {
        zone_balances(records, window, &self.zones)
    }

    pub fn zone_balance(
        &self,
        records: &[MeterRecord],
        zone: &str,
        window: &TimeWindow,
    ) -> ZoneBalance {
        zone_balance(records, zone, window, &self.zones)
    }

    /// STP totals for a `YYYY-MM[:YYYY-MM]` period, financials derived with
    /// the configured rates.
    pub fn treatment_metrics(
        &self,
        records: &[TreatmentRecord],
        period: &str,
    ) -> Result<TreatmentMetrics> {
        let selected = filter_by_period(records, period)?;
        Ok(TreatmentMetrics::from_records(
            selected,
            &self.config.treatment_rates,
        ))
    }

    pub fn treatment_monthly_summary(
        &self,
        records: &[TreatmentRecord],
        period: &str,
    ) -> Result<Vec<MonthlyTreatmentSummary>> {
        let selected = filter_by_period(records, period)?;
        Ok(monthly_treatment_summary(
            selected,
            &self.config.treatment_rates,
        ))
    }

    pub fn process(
        &self,
        records: &[MeterRecord],
        category: &str,
        start: usize,
        end: usize,
    ) -> Result<WaterBalanceOutput> {
        let window = self.window(start, end)?;

        info!(
            "Processing water balance for '{}' over {} ({} meters)",
            category,
            window,
            records.len()
        );

        let cascade = self.cascade(records, &window);
        let report = self.validate_category(records, category, &window);

        if !report.is_valid {
            warn!(
                "Water balance for '{}' over {} needs review: {} errors, {} discrepancies",
                category,
                window,
                report.errors.len(),
                report.discrepancies.len()
            );
        }

        Ok(WaterBalanceOutput {
            window,
            cascade,
            report,
        })
    }
}

pub fn process_water_balance(
    config: EngineConfig,
    rows: &[RawMeterRow],
    category: &str,
    start: usize,
    end: usize,
) -> Result<WaterBalanceOutput> {
    let processor = WaterBalanceProcessor::new(config)?;
    let records = processor.ingest(rows)?;
    processor.process(&records, category, start, end)
}
