use thiserror::Error;

#[derive(Error, Debug)]
pub enum WaterBalanceError {
    #[error("Invalid time window {start}..={end}: calendar has {len} months (need 0 <= start <= end < {len})")]
    InvalidWindow { start: usize, end: usize, len: usize },

    #[error("Month calendar is empty")]
    EmptyCalendar,

    #[error("Invalid month key: {0}. Expected e.g. 'jan_25'")]
    InvalidMonthKey(String),

    #[error("Malformed meter record #{index}: {details}")]
    MalformedRecord { index: usize, details: String },

    #[error("Invalid threshold {name} = {value}: {details}")]
    InvalidThreshold {
        name: String,
        value: f64,
        details: String,
    },

    #[error("Invalid category definition: {0}")]
    InvalidCategory(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WaterBalanceError>;
