//! Sewage treatment plant (STP) operations: daily inlet sewage, treated
//! effluent (TSE) sent to irrigation and tanker discharges, with the money
//! those produce.

use crate::error::{Result, WaterBalanceError};
use crate::utils::{parse_period_string, percentage};
use chrono::{Datelike, NaiveDate};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tariffs used to fill in financial figures the operations log left blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentRates {
    /// Fee charged per tanker discharged at the plant.
    pub tanker_fee: f64,
    /// Potable water cost avoided per m³ of TSE used for irrigation.
    pub tse_saving_per_cubic_meter: f64,
}

impl Default for TreatmentRates {
    fn default() -> Self {
        Self {
            tanker_fee: 5.0,
            tse_saving_per_cubic_meter: 0.45,
        }
    }
}

impl TreatmentRates {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tanker_fee", self.tanker_fee),
            ("tse_saving_per_cubic_meter", self.tse_saving_per_cubic_meter),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(WaterBalanceError::InvalidThreshold {
                    name: name.to_string(),
                    value,
                    details: "rate must be a finite, non-negative number".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One day of plant operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TreatmentRecord {
    pub operation_date: NaiveDate,
    #[serde(default)]
    pub total_inlet_sewage: f64,
    #[serde(default)]
    pub tse_water_to_irrigation: f64,
    #[serde(default)]
    pub tankers_discharged: u32,
    #[serde(default)]
    pub income_from_tankers: Option<f64>,
    #[serde(default)]
    pub saving_from_tse: Option<f64>,
    #[serde(default)]
    pub total_saving_income: Option<f64>,
}

fn recorded(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

impl TreatmentRecord {
    /// Copy with every financial figure filled. A missing or zero figure is
    /// recomputed from volumes and `rates`.
    pub fn with_derived_financials(&self, rates: &TreatmentRates) -> TreatmentRecord {
        let income = recorded(self.income_from_tankers)
            .unwrap_or(self.tankers_discharged as f64 * rates.tanker_fee);
        let saving = recorded(self.saving_from_tse)
            .unwrap_or(self.tse_water_to_irrigation * rates.tse_saving_per_cubic_meter);
        let total = recorded(self.total_saving_income).unwrap_or(income + saving);

        TreatmentRecord {
            income_from_tankers: Some(income),
            saving_from_tse: Some(saving),
            total_saving_income: Some(total),
            ..self.clone()
        }
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Vec<TreatmentRecord>)
    }
}

pub fn treatment_records_from_json(json: &str) -> Result<Vec<TreatmentRecord>> {
    Ok(serde_json::from_str(json)?)
}

/// Records whose operation date falls in a `YYYY-MM` or `YYYY-MM:YYYY-MM`
/// period, both ends inclusive.
pub fn filter_by_period<'a>(
    records: &'a [TreatmentRecord],
    period: &str,
) -> Result<Vec<&'a TreatmentRecord>> {
    let (start, end) = parse_period_string(period)?;

    let filtered: Vec<&TreatmentRecord> = records
        .iter()
        .filter(|r| r.operation_date >= start && r.operation_date <= end)
        .collect();

    debug!(
        "{} of {} STP records fall in {}",
        filtered.len(),
        records.len(),
        period
    );

    Ok(filtered)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreatmentMetrics {
    pub record_count: usize,
    pub total_inlet_sewage: f64,
    pub total_tse: f64,
    pub total_tankers: u64,
    pub total_income: f64,
    pub total_savings: f64,
    pub total_impact: f64,
    /// TSE to irrigation as a share of inlet sewage.
    pub tse_recovery_percentage: f64,
}

impl TreatmentMetrics {
    pub fn from_records<'a, I>(records: I, rates: &TreatmentRates) -> Self
    where
        I: IntoIterator<Item = &'a TreatmentRecord>,
    {
        let mut metrics = TreatmentMetrics::default();

        for record in records {
            let derived = record.with_derived_financials(rates);
            metrics.record_count += 1;
            metrics.total_inlet_sewage += derived.total_inlet_sewage;
            metrics.total_tse += derived.tse_water_to_irrigation;
            metrics.total_tankers += u64::from(derived.tankers_discharged);
            metrics.total_income += derived.income_from_tankers.unwrap_or(0.0);
            metrics.total_savings += derived.saving_from_tse.unwrap_or(0.0);
            metrics.total_impact += derived.total_saving_income.unwrap_or(0.0);
        }

        metrics.tse_recovery_percentage = percentage(metrics.total_tse, metrics.total_inlet_sewage);
        metrics
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTreatmentSummary {
    /// `YYYY-MM`
    pub month: String,
    /// `Jan 2025`
    pub label: String,
    pub metrics: TreatmentMetrics,
}

/// Per-month totals in calendar order.
pub fn monthly_treatment_summary<'a, I>(
    records: I,
    rates: &TreatmentRates,
) -> Vec<MonthlyTreatmentSummary>
where
    I: IntoIterator<Item = &'a TreatmentRecord>,
{
    let mut by_month: BTreeMap<(i32, u32), Vec<&TreatmentRecord>> = BTreeMap::new();
    for record in records {
        let date = record.operation_date;
        by_month.entry((date.year(), date.month())).or_default().push(record);
    }

    by_month
        .into_iter()
        .map(|((year, month), group)| {
            let label = group
                .first()
                .map(|r| r.operation_date.format("%b %Y").to_string())
                .unwrap_or_default();
            MonthlyTreatmentSummary {
                month: format!("{}-{:02}", year, month),
                label,
                metrics: TreatmentMetrics::from_records(group, rates),
            }
        })
        .collect()
}
