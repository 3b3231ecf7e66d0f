use crate::error::{Result, WaterBalanceError};
use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .ok_or_else(|| WaterBalanceError::DateError(format!("No such month: {}-{:02}", year, month)))
}

pub fn first_day_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| WaterBalanceError::DateError(format!("No such month: {}-{:02}", year, month)))
}

/// Returns the (year, month) pair following the given one.
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// `part / whole * 100`, with `x / 0 = 0` so no NaN or infinity leaks out.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole == 0.0 || !whole.is_finite() {
        0.0
    } else {
        part / whole * 100.0
    }
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (first day of start month, last day of end month)
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    let parse_month = |raw: &str, which: &str| -> Result<NaiveDate> {
        let start_str = format!("{}-01", raw.trim());
        NaiveDate::parse_from_str(&start_str, "%Y-%m-%d").map_err(|_| {
            WaterBalanceError::DateError(format!(
                "Invalid {}date format in period: {}. Expected YYYY-MM",
                which, raw
            ))
        })
    };

    match parts.len() {
        1 => {
            let start = parse_month(parts[0], "")?;
            let end = last_day_of_month(start.year(), start.month())?;
            Ok((start, end))
        }
        2 => {
            let start = parse_month(parts[0], "start ")?;
            let end_ref = parse_month(parts[1], "end ")?;
            let end = last_day_of_month(end_ref.year(), end_ref.month())?;

            if end < start {
                return Err(WaterBalanceError::DateError(format!(
                    "Period {} ends before it starts",
                    period
                )));
            }
            Ok((start, end))
        }
        _ => Err(WaterBalanceError::DateError(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}
