//! Error types shared by schema construction, packing and parsing.

use thiserror::Error;

use crate::schema::Segment;

/// Crate-wide result alias.
pub type Result<T, E = SnowflakeError> = std::result::Result<T, E>;

/// A schema description that cannot be turned into a [`Schema`](crate::Schema).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{segment} width must be >= 0, got {width}")]
    NegativeWidth { segment: Segment, width: i64 },
    #[error("leading bit must be 0 or 1, got {0}")]
    LeadingBit(i64),
    #[error("sum of leading_bit, timestamp, param1, param2 and sequence widths must be exactly 64, got {0}")]
    WidthSum(i128),
    #[error("epoch must be a non-negative Unix timestamp in milliseconds with at most 13 digits, got {0}")]
    Epoch(i64),
    #[error("unknown epoch name: {0}")]
    UnknownEpoch(String),
}

/// Errors that can occur during snowflake operations.
#[derive(Error, Debug)]
pub enum SnowflakeError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),
    #[error("timestamp {timestamp_ms}ms is before the epoch {epoch_ms}ms")]
    BeforeEpoch { timestamp_ms: i64, epoch_ms: i64 },
    #[error("{elapsed_ms}ms since epoch does not fit in a {width}-bit timestamp")]
    TimestampOverflow { elapsed_ms: i64, width: u32 },
    #[error("{field} value {value} does not fit in {width} bits")]
    FieldOverflow {
        field: Segment,
        value: i128,
        width: u32,
    },
    #[error("not a valid unsigned 64-bit snowflake: {0}")]
    ValueRange(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SnowflakeError {
    /// True for errors caused by a timestamp outside the schema's time window.
    pub fn is_epoch_range(&self) -> bool {
        matches!(
            self,
            Self::BeforeEpoch { .. } | Self::TimestampOverflow { .. }
        )
    }
}
