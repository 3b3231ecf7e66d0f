use crate::error::{Result, WaterBalanceError};
use crate::utils::{first_day_of_month, last_day_of_month, next_month};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One calendar month of the reading sequence, keyed the way the meter
/// columns are named (`jan_25` is January 2025).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey {
    first_day: NaiveDate,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        Ok(Self {
            first_day: first_day_of_month(year, month)?,
        })
    }

    /// Parses `mon_yy` keys such as `jan_25` or `Jul_25`.
    pub fn parse(key: &str) -> Result<Self> {
        let trimmed = key.trim();
        if trimmed.len() != 6 {
            return Err(WaterBalanceError::InvalidMonthKey(key.to_string()));
        }

        let first_day = NaiveDate::parse_from_str(&format!("01_{}", trimmed), "%d_%b_%y")
            .map_err(|_| WaterBalanceError::InvalidMonthKey(key.to_string()))?;

        Ok(Self { first_day })
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn key(&self) -> String {
        self.first_day.format("%b_%y").to_string().to_lowercase()
    }

    /// Display label, e.g. `Jan-25`.
    pub fn label(&self) -> String {
        self.first_day.format("%b-%y").to_string()
    }

    pub fn period_start(&self) -> NaiveDate {
        self.first_day
    }

    pub fn period_end(&self) -> Result<NaiveDate> {
        last_day_of_month(self.year(), self.month())
    }

    pub fn next(&self) -> Result<Self> {
        let (year, month) = next_month(self.year(), self.month());
        Self::new(year, month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl TryFrom<String> for MonthKey {
    type Error = WaterBalanceError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.key()
    }
}

/// The fixed, ordered month sequence that every window is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCalendar {
    months: Vec<MonthKey>,
    keys: Vec<String>,
}

impl MonthCalendar {
    pub fn new(months: Vec<MonthKey>) -> Result<Self> {
        if months.is_empty() {
            return Err(WaterBalanceError::EmptyCalendar);
        }

        for pair in months.windows(2) {
            if pair[1] <= pair[0] {
                return Err(WaterBalanceError::InvalidMonthKey(format!(
                    "{} follows {}: month keys must be strictly ascending",
                    pair[1], pair[0]
                )));
            }
        }

        let keys = months.iter().map(MonthKey::key).collect();
        Ok(Self { months, keys })
    }

    pub fn from_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self> {
        let months = keys
            .iter()
            .map(|k| MonthKey::parse(k.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(months)
    }

    pub fn consecutive(start: MonthKey, count: usize) -> Result<Self> {
        let mut months = Vec::with_capacity(count);
        let mut current = start;
        for i in 0..count {
            if i > 0 {
                current = current.next()?;
            }
            months.push(current);
        }
        Self::new(months)
    }

    pub fn len(&self) -> usize {
        self.months.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        let wanted = key.trim().to_lowercase();
        self.keys.iter().position(|k| *k == wanted)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Resolves the inclusive index range `start..=end` to its month keys.
    /// Out-of-range or inverted indices are an error; nothing is clamped.
    pub fn resolve(&self, start: usize, end: usize) -> Result<TimeWindow> {
        if start > end || end >= self.months.len() {
            return Err(WaterBalanceError::InvalidWindow {
                start,
                end,
                len: self.months.len(),
            });
        }

        Ok(TimeWindow {
            start,
            end,
            months: self.months[start..=end].to_vec(),
            keys: self.keys[start..=end].to_vec(),
        })
    }

    pub fn full_window(&self) -> Result<TimeWindow> {
        self.resolve(0, self.months.len().saturating_sub(1))
    }
}

/// An inclusive, contiguous range of calendar months.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    start: usize,
    end: usize,
    months: Vec<MonthKey>,
    keys: Vec<String>,
}

impl TimeWindow {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn months(&self) -> &[MonthKey] {
        &self.months
    }

    pub fn labels(&self) -> Vec<String> {
        self.months.iter().map(MonthKey::label).collect()
    }

    /// First and last calendar day covered by the window.
    pub fn period(&self) -> Result<(NaiveDate, NaiveDate)> {
        match (self.months.first(), self.months.last()) {
            (Some(first), Some(last)) => Ok((first.period_start(), last.period_end()?)),
            _ => Err(WaterBalanceError::EmptyCalendar),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) if first == last => write!(f, "{}", first),
            (Some(first), Some(last)) => write!(f, "{}..{}", first, last),
            _ => write!(f, "<empty>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calendar() -> MonthCalendar {
        MonthCalendar::from_keys(&[
            "jan_25", "feb_25", "mar_25", "apr_25", "may_25", "jun_25", "jul_25",
        ])
        .unwrap()
    }

    #[test]
    fn test_month_key_parse_and_format() {
        let key = MonthKey::parse("Mar_25").unwrap();
        assert_eq!(key.year(), 2025);
        assert_eq!(key.month(), 3);
        assert_eq!(key.key(), "mar_25");
        assert_eq!(key.label(), "Mar-25");
        assert_eq!(
            key.period_end().unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
        );

        assert!(MonthKey::parse("march_2025").is_err());
        assert!(MonthKey::parse("xyz_25").is_err());
        assert!(MonthKey::parse("").is_err());
    }

    #[test]
    fn test_month_key_serializes_as_key_string() {
        let key = MonthKey::new(2024, 12).unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"dec_24\"");
        let back: MonthKey = serde_json::from_str("\"dec_24\"").unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_consecutive_calendar_crosses_year() {
        let cal = MonthCalendar::consecutive(MonthKey::new(2024, 11).unwrap(), 4).unwrap();
        assert_eq!(cal.keys(), &["nov_24", "dec_24", "jan_25", "feb_25"]);
    }

    #[test]
    fn test_calendar_rejects_unordered_keys() {
        assert!(MonthCalendar::from_keys(&["feb_25", "jan_25"]).is_err());
        assert!(MonthCalendar::from_keys(&["jan_25", "jan_25"]).is_err());
        let empty: [&str; 0] = [];
        assert!(matches!(
            MonthCalendar::from_keys(&empty),
            Err(WaterBalanceError::EmptyCalendar)
        ));
    }

    #[test]
    fn test_resolve_reproduces_slice_in_order() {
        let cal = calendar();
        for i in 0..cal.len() {
            for j in i..cal.len() {
                let window = cal.resolve(i, j).unwrap();
                assert_eq!(window.len(), j - i + 1);
                assert_eq!(window.keys(), &cal.keys()[i..=j]);
            }
        }
    }

    #[test]
    fn test_resolve_rejects_invalid_ranges() {
        let cal = calendar();
        assert!(matches!(
            cal.resolve(3, 1),
            Err(WaterBalanceError::InvalidWindow { start: 3, end: 1, len: 7 })
        ));
        assert!(cal.resolve(0, 7).is_err());
        assert!(cal.resolve(7, 7).is_err());
    }

    #[test]
    fn test_window_period_and_labels() {
        let window = calendar().resolve(1, 2).unwrap();
        assert_eq!(window.labels(), vec!["Feb-25", "Mar-25"]);
        let (start, end) = window.period().unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
        assert_eq!(window.to_string(), "feb_25..mar_25");
    }
}
