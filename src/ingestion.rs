use crate::error::{Result, WaterBalanceError};
use crate::model::{Level, MeterRecord};
use crate::schema::RawMeterRow;
use crate::window::MonthCalendar;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Converts data-source rows into canonical meter records.
///
/// A row without a meter label is a malformed shape and fails the whole
/// snapshot. Reading columns that are not calendar month keys are dropped;
/// calendar months the row lacks are left absent and read as missing.
pub fn convert_rows_to_records(
    rows: &[RawMeterRow],
    calendar: &MonthCalendar,
) -> Result<Vec<MeterRecord>> {
    let mut records = Vec::with_capacity(rows.len());
    let mut ignored_columns: BTreeSet<String> = BTreeSet::new();

    for (index, row) in rows.iter().enumerate() {
        let label = row.meter_label.trim();
        if label.is_empty() {
            return Err(WaterBalanceError::MalformedRecord {
                index,
                details: "meter_label is blank".to_string(),
            });
        }

        let id = non_blank(&row.account_number).unwrap_or_else(|| label.to_string());
        let level = row
            .label
            .as_deref()
            .map(Level::parse)
            .unwrap_or_else(|| Level::Unrecognized(String::new()));

        let mut readings = BTreeMap::new();
        for (column, reading) in &row.readings {
            match calendar.position(column) {
                Some(pos) => {
                    readings.insert(calendar.keys()[pos].clone(), reading.clone());
                }
                None => {
                    ignored_columns.insert(column.clone());
                }
            }
        }

        records.push(MeterRecord {
            id,
            label: label.to_string(),
            level,
            zone: non_blank(&row.zone),
            usage_type: non_blank(&row.usage_type),
            parent_meter: non_blank(&row.parent_meter),
            readings,
        });
    }

    if !ignored_columns.is_empty() {
        debug!(
            "Ignored {} non-month columns during ingestion: {:?}",
            ignored_columns.len(),
            ignored_columns
        );
    }

    let unrecognized = records.iter().filter(|r| !r.level.is_recognized()).count();
    if unrecognized > 0 {
        warn!(
            "{} of {} meters carry an unrecognized level and will match no hierarchy tier",
            unrecognized,
            records.len()
        );
    }

    Ok(records)
}

pub fn records_from_json(json: &str, calendar: &MonthCalendar) -> Result<Vec<MeterRecord>> {
    let rows = RawMeterRow::rows_from_json(json)?;
    convert_rows_to_records(&rows, calendar)
}
