use crate::classifier::{CategoryDefinition, Classifier};
use crate::error::{Result, WaterBalanceError};
use crate::treatment::TreatmentRates;
use crate::window::MonthCalendar;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MONTH_KEYS: [&str; 7] = [
    "jan_25", "feb_25", "mar_25", "apr_25", "may_25", "jun_25", "jul_25",
];

/// Tunable limits used by validation and its recommendations.
/// The defaults come from one site's data and are not a general model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceThresholds {
    /// Per-meter window total above which a meter is flagged as unusually high.
    pub high_consumption_volume: f64,
    /// Fraction a child tier may exceed its parent before it is an error.
    pub hierarchy_tolerance: f64,
    /// Ceiling on the L1 -> L2 loss percentage.
    pub max_stage1_loss_percentage: f64,
    /// Largest difference between the two computation paths that still agrees.
    pub discrepancy_epsilon: f64,
    pub warning_review_count: usize,
    pub high_share_of_l1_percentage: f64,
    pub high_stage1_loss_volume: f64,
}

impl Default for BalanceThresholds {
    fn default() -> Self {
        Self {
            high_consumption_volume: 100_000.0,
            hierarchy_tolerance: 0.10,
            max_stage1_loss_percentage: 30.0,
            discrepancy_epsilon: 0.01,
            warning_review_count: 5,
            high_share_of_l1_percentage: 60.0,
            high_stage1_loss_volume: 10_000.0,
        }
    }
}

impl BalanceThresholds {
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("high_consumption_volume", self.high_consumption_volume),
            ("hierarchy_tolerance", self.hierarchy_tolerance),
            ("max_stage1_loss_percentage", self.max_stage1_loss_percentage),
            ("discrepancy_epsilon", self.discrepancy_epsilon),
            ("high_share_of_l1_percentage", self.high_share_of_l1_percentage),
            ("high_stage1_loss_volume", self.high_stage1_loss_volume),
        ];

        for (name, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(WaterBalanceError::InvalidThreshold {
                    name: name.to_string(),
                    value,
                    details: "must be a finite, non-negative number".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub month_keys: Vec<String>,
    pub thresholds: BalanceThresholds,
    /// Replaces the built-in usage-type table when set.
    pub usage_categories: Option<Vec<CategoryDefinition>>,
    /// Replaces the built-in zone catalog when set.
    pub zones: Option<Vec<CategoryDefinition>>,
    pub treatment_rates: TreatmentRates,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            month_keys: DEFAULT_MONTH_KEYS.iter().map(|k| k.to_string()).collect(),
            thresholds: BalanceThresholds::default(),
            usage_categories: None,
            zones: None,
            treatment_rates: TreatmentRates::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.calendar()?;
        self.thresholds.validate()?;
        self.treatment_rates.validate()?;

        for table in [&self.usage_categories, &self.zones].into_iter().flatten() {
            validate_category_table(table)?;
        }

        Ok(())
    }

    pub fn calendar(&self) -> Result<MonthCalendar> {
        MonthCalendar::from_keys(&self.month_keys)
    }

    pub fn usage_classifier(&self) -> Classifier {
        match &self.usage_categories {
            Some(categories) => Classifier::new(categories.clone()),
            None => Classifier::usage_types(),
        }
    }

    pub fn zone_classifier(&self) -> Classifier {
        match &self.zones {
            Some(zones) => Classifier::new(zones.clone()),
            None => Classifier::zones(),
        }
    }
}

fn validate_category_table(categories: &[CategoryDefinition]) -> Result<()> {
    for (idx, category) in categories.iter().enumerate() {
        if category.id.trim().is_empty() {
            return Err(WaterBalanceError::InvalidCategory(format!(
                "Category #{} has an empty id",
                idx
            )));
        }
    }
    Ok(())
}
