//! Validation & verification. A category's consumption is computed twice:
//! once meter by meter with data-quality checks ([`validate`]) and once month
//! by month straight from the raw readings ([`verify`]). [`cross_check`]
//! diffs the two, and [`comprehensive_validation`] folds in the hierarchy
//! relationship check and recommendations.
//!
//! Nothing here fails on bad data. Every finding is a string in a report.

use crate::classifier::Classifier;
use crate::config::BalanceThresholds;
use crate::engine::{aggregate, month_total, partition_by_level, MonthlyTotal};
use crate::error::Result;
use crate::model::MeterRecord;
use crate::utils::percentage;
use crate::window::TimeWindow;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_meters: usize,
    pub validated_meters: usize,
    pub skipped_meters: usize,
    pub total_consumption: f64,
    pub average_consumption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: ValidationSummary,
}

/// Second, independent computation of a category's consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeConsumptionData {
    pub category: String,
    pub monthly_data: Vec<MonthlyTotal>,
    pub total: f64,
    pub meter_count: usize,
    pub percentage_of_total: f64,
    pub percentage_of_l1: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRelationship {
    pub parent_total: f64,
    pub child_total: f64,
    pub difference: f64,
}

impl LevelRelationship {
    fn new(parent_total: f64, child_total: f64) -> Self {
        Self {
            parent_total,
            child_total,
            difference: parent_total - child_total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipReport {
    pub is_valid: bool,
    pub l1_to_l2: LevelRelationship,
    pub l2_to_l3: LevelRelationship,
    pub l3_to_l4: LevelRelationship,
    pub errors: Vec<String>,
}

/// Outcome of a full validation run. Advisory: `is_valid == false` means
/// there is something for a person to look at, not that the figures are
/// unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub summary: ValidationSummary,
    pub discrepancies: Vec<String>,
    pub recommendations: Vec<String>,
    pub verification: TypeConsumptionData,
    pub relationships: RelationshipReport,
}

impl ValidationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct WaterBalanceValidator<'a> {
    classifier: &'a Classifier,
    thresholds: &'a BalanceThresholds,
}

impl<'a> WaterBalanceValidator<'a> {
    pub fn new(classifier: &'a Classifier, thresholds: &'a BalanceThresholds) -> Self {
        Self {
            classifier,
            thresholds,
        }
    }

    fn select<'r>(&self, records: &'r [MeterRecord], category: &str) -> Vec<&'r MeterRecord> {
        records
            .iter()
            .filter(|r| self.classifier.matches(r.usage_type.as_deref(), category))
            .collect()
    }

    /// First pass: per-meter data-quality checks. Volume warnings use the sum
    /// of a meter's valid readings. Meters with a non-numeric or negative
    /// reading still get those warnings but are skipped from the totals.
    pub fn validate(
        &self,
        records: &[MeterRecord],
        category: &str,
        window: &TimeWindow,
    ) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let meters = self.select(records, category);
        debug!(
            "validate: {} of {} meters match '{}'",
            meters.len(),
            records.len(),
            category
        );

        if meters.is_empty() {
            errors.push(format!("No meters found for type: {}", category));
            return ValidationResult {
                is_valid: false,
                errors,
                warnings,
                summary: ValidationSummary {
                    skipped_meters: records.len(),
                    ..ValidationSummary::default()
                },
            };
        }

        let mut validated_meters = 0;
        let mut skipped_meters = 0;
        let mut total_consumption = 0.0;

        for meter in &meters {
            let mut meter_is_valid = true;
            let mut meter_total = 0.0;

            for key in window.keys() {
                let reading = meter.reading(key);
                match reading.volume() {
                    Some(v) if v < 0.0 => {
                        errors.push(format!(
                            "Meter {} has negative value for {}: {}",
                            meter.label, key, v
                        ));
                        meter_is_valid = false;
                    }
                    Some(v) => meter_total += v,
                    None if reading.is_missing() => {
                        warnings.push(format!("Meter {} has no data for {}", meter.label, key));
                    }
                    None => {
                        errors.push(format!(
                            "Meter {} has invalid data type for {}: {}",
                            meter.label,
                            key,
                            reading.type_name()
                        ));
                        meter_is_valid = false;
                    }
                }
            }

            if meter_total > self.thresholds.high_consumption_volume {
                warnings.push(format!(
                    "Meter {} has unusually high consumption: {} m³",
                    meter.label, meter_total
                ));
            }

            if meter_total == 0.0 {
                warnings.push(format!(
                    "Meter {} has zero consumption for selected period",
                    meter.label
                ));
            }

            if !meter_is_valid {
                skipped_meters += 1;
                continue;
            }

            validated_meters += 1;
            total_consumption += meter_total;
        }

        if skipped_meters > 0 {
            warn!(
                "{} of {} '{}' meters skipped for invalid readings",
                skipped_meters,
                meters.len(),
                category
            );
        }

        let average_consumption = if validated_meters > 0 {
            total_consumption / validated_meters as f64
        } else {
            0.0
        };

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            summary: ValidationSummary {
                total_meters: meters.len(),
                validated_meters,
                skipped_meters,
                total_consumption,
                average_consumption,
            },
        }
    }

    /// Second pass: month-by-month totals for the category with no record
    /// skipped, plus its share of L1 and of all consumption.
    pub fn verify(
        &self,
        records: &[MeterRecord],
        category: &str,
        window: &TimeWindow,
    ) -> TypeConsumptionData {
        let meters = self.select(records, category);

        let monthly_data: Vec<MonthlyTotal> = window
            .months()
            .iter()
            .zip(window.keys())
            .map(|(month, key)| MonthlyTotal {
                month: key.clone(),
                label: month.label(),
                total: month_total(meters.iter().copied(), key),
            })
            .collect();
        let total = monthly_data.iter().fold(0.0, |acc, m| acc + m.total);

        let l1_total = aggregate(partition_by_level(records).l1, window);
        let grand_total = aggregate(records, window);

        debug!(
            "verify: '{}' total {} over {} meters (L1 {}, all {})",
            category,
            total,
            meters.len(),
            l1_total,
            grand_total
        );

        TypeConsumptionData {
            category: category.to_string(),
            monthly_data,
            total,
            meter_count: meters.len(),
            percentage_of_total: percentage(total, grand_total),
            percentage_of_l1: percentage(total, l1_total),
        }
    }

    pub fn cross_check(
        &self,
        validation: &ValidationResult,
        verification: &TypeConsumptionData,
    ) -> Vec<String> {
        let mut discrepancies = Vec::new();
        let summary = &validation.summary;

        if (summary.total_consumption - verification.total).abs()
            > self.thresholds.discrepancy_epsilon
        {
            discrepancies.push(format!(
                "Total consumption mismatch: Validation={}, Verification={}",
                summary.total_consumption, verification.total
            ));
        }

        if summary.total_meters != verification.meter_count {
            discrepancies.push(format!(
                "Meter count mismatch: Validation={}, Verification={}",
                summary.total_meters, verification.meter_count
            ));
        }

        if !(0.0..=100.0).contains(&verification.percentage_of_l1) {
            discrepancies.push(format!(
                "Invalid L1 percentage: {}%",
                verification.percentage_of_l1
            ));
        }

        if !(0.0..=100.0).contains(&verification.percentage_of_total) {
            discrepancies.push(format!(
                "Invalid total percentage: {}%",
                verification.percentage_of_total
            ));
        }

        for discrepancy in &discrepancies {
            warn!("{}: {}", verification.category, discrepancy);
        }

        discrepancies
    }

    /// Tier totals over the window, regardless of category. A child tier
    /// above its parent (beyond the tolerance for L3 and L4) or an L1 -> L2
    /// loss above the ceiling is an error.
    pub fn check_hierarchy_relationships(
        &self,
        records: &[MeterRecord],
        window: &TimeWindow,
    ) -> RelationshipReport {
        let groups = partition_by_level(records);
        let l1 = aggregate(groups.l1.iter().copied(), window);
        let l2 = aggregate(groups.l2.iter().copied(), window);
        let l3 = aggregate(groups.l3.iter().copied(), window);
        let l4 = aggregate(groups.l4.iter().copied(), window);

        let tolerance = 1.0 + self.thresholds.hierarchy_tolerance;
        let mut errors = Vec::new();

        if l2 > l1 {
            errors.push(format!(
                "L2 total ({}) exceeds L1 total ({}) - impossible without external source",
                l2, l1
            ));
        }

        if l3 > l2 * tolerance {
            errors.push(format!(
                "L3 total ({}) significantly exceeds L2 total ({})",
                l3, l2
            ));
        }

        if l4 > l3 * tolerance {
            errors.push(format!(
                "L4 total ({}) significantly exceeds L3 total ({})",
                l4, l3
            ));
        }

        let l1_to_l2 = LevelRelationship::new(l1, l2);
        let stage1_loss = percentage(l1_to_l2.difference, l1);
        if stage1_loss > self.thresholds.max_stage1_loss_percentage {
            errors.push(format!(
                "Excessive water loss from L1 to L2: {:.1}%",
                stage1_loss
            ));
        }

        RelationshipReport {
            is_valid: errors.is_empty(),
            l1_to_l2,
            l2_to_l3: LevelRelationship::new(l2, l3),
            l3_to_l4: LevelRelationship::new(l3, l4),
            errors,
        }
    }

    pub fn comprehensive_validation(
        &self,
        records: &[MeterRecord],
        category: &str,
        window: &TimeWindow,
    ) -> ValidationReport {
        let validation = self.validate(records, category, window);
        let verification = self.verify(records, category, window);
        let discrepancies = self.cross_check(&validation, &verification);
        let relationships = self.check_hierarchy_relationships(records, window);

        let mut recommendations = Vec::new();

        if validation.warnings.len() > self.thresholds.warning_review_count {
            recommendations.push("Consider reviewing meters with missing or zero data".to_string());
        }

        if validation.summary.skipped_meters > 0 && validation.summary.total_meters > 0 {
            recommendations.push(format!(
                "Correct invalid readings on {} skipped meter(s) before relying on {} totals",
                validation.summary.skipped_meters, category
            ));
        }

        if verification.percentage_of_l1 > self.thresholds.high_share_of_l1_percentage {
            recommendations.push(format!(
                "{} consumption is high ({:.1}% of L1)",
                category, verification.percentage_of_l1
            ));
        }

        if relationships.l1_to_l2.difference > self.thresholds.high_stage1_loss_volume {
            recommendations.push("Investigate high water loss between L1 and L2 meters".to_string());
        }

        let is_valid = validation.is_valid && discrepancies.is_empty() && relationships.is_valid;

        let mut errors = validation.errors;
        errors.extend(relationships.errors.iter().cloned());

        info!(
            "Validation of '{}' over {}: valid={} ({} errors, {} warnings, {} discrepancies)",
            category,
            window,
            is_valid,
            errors.len(),
            validation.warnings.len(),
            discrepancies.len()
        );

        ValidationReport {
            is_valid,
            errors,
            warnings: validation.warnings,
            summary: validation.summary,
            discrepancies,
            recommendations,
            verification,
            relationships,
        }
    }
}

pub fn validate(
    records: &[MeterRecord],
    category: &str,
    window: &TimeWindow,
) -> ValidationResult {
    let classifier = Classifier::usage_types();
    let thresholds = BalanceThresholds::default();
    WaterBalanceValidator::new(&classifier, &thresholds).validate(records, category, window)
}

pub fn verify(
    records: &[MeterRecord],
    category: &str,
    window: &TimeWindow,
) -> TypeConsumptionData {
    let classifier = Classifier::usage_types();
    let thresholds = BalanceThresholds::default();
    WaterBalanceValidator::new(&classifier, &thresholds).verify(records, category, window)
}

pub fn cross_check(validation: &ValidationResult, verification: &TypeConsumptionData) -> Vec<String> {
    let classifier = Classifier::usage_types();
    let thresholds = BalanceThresholds::default();
    WaterBalanceValidator::new(&classifier, &thresholds).cross_check(validation, verification)
}

pub fn check_hierarchy_relationships(
    records: &[MeterRecord],
    window: &TimeWindow,
) -> RelationshipReport {
    let classifier = Classifier::usage_types();
    let thresholds = BalanceThresholds::default();
    WaterBalanceValidator::new(&classifier, &thresholds).check_hierarchy_relationships(records, window)
}

pub fn comprehensive_validation(
    records: &[MeterRecord],
    category: &str,
    window: &TimeWindow,
) -> ValidationReport {
    let classifier = Classifier::usage_types();
    let thresholds = BalanceThresholds::default();
    WaterBalanceValidator::new(&classifier, &thresholds)
        .comprehensive_validation(records, category, window)
}
