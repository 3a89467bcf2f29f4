//! Packing field values into snowflakes and unpacking them again.
//!
//! Segments are laid out MSB to LSB as leading bit, timestamp, param1,
//! param2, sequence. The leading bit is never set by [`pack`] and is masked
//! off by [`unpack`].

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::error::{Result, SnowflakeError};
use crate::schema::{Schema, Segment};

/// Field values of a snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SnowflakeParts {
    pub timestamp: DateTime<Utc>,
    pub param1: u64,
    pub param2: u64,
    pub sequence: u64,
}

impl SnowflakeParts {
    /// Unix timestamp in milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

static DECIMAL_U64: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{1,20}$").unwrap());

/// Parse decimal snowflake text, ignoring surrounding whitespace.
pub fn parse_value(s: &str) -> Result<u64> {
    let digits = s.trim();
    if !DECIMAL_U64.is_match(digits) {
        return Err(SnowflakeError::ValueRange(s.to_string()));
    }
    digits
        .parse::<u64>()
        .map_err(|_| SnowflakeError::ValueRange(s.to_string()))
}

/// Check that `value` fits in the segment, accepting any integer width.
///
/// Negative values are reported as [`SnowflakeError::FieldOverflow`].
pub fn checked_field(schema: &Schema, segment: Segment, value: i128) -> Result<u64> {
    u64::try_from(value)
        .ok()
        .filter(|v| *v <= schema.max_value(segment))
        .ok_or(SnowflakeError::FieldOverflow {
            field: segment,
            value,
            width: schema.width(segment),
        })
}

fn check_field(schema: &Schema, segment: Segment, value: u64) -> Result<u64> {
    checked_field(schema, segment, i128::from(value))
}

/// Milliseconds between the schema epoch and `timestamp`, range-checked.
fn elapsed_ms(schema: &Schema, timestamp: DateTime<Utc>) -> Result<u64> {
    let timestamp_ms = timestamp.timestamp_millis();
    let epoch_ms = schema.epoch_ms();
    let elapsed = timestamp_ms - epoch_ms;
    if elapsed < 0 {
        return Err(SnowflakeError::BeforeEpoch {
            timestamp_ms,
            epoch_ms,
        });
    }
    let elapsed_u64 = elapsed as u64;
    if elapsed_u64 > schema.max_timestamp_ms() {
        return Err(SnowflakeError::TimestampOverflow {
            elapsed_ms: elapsed,
            width: schema.timestamp_width(),
        });
    }
    Ok(elapsed_u64)
}

fn place(schema: &Schema, segment: Segment, value: u64) -> u64 {
    // A zero-width segment may sit at shift 64; its value is always 0.
    value.checked_shl(schema.shift(segment)).unwrap_or(0)
}

fn extract(schema: &Schema, segment: Segment, value: u64) -> u64 {
    value.checked_shr(schema.shift(segment)).unwrap_or(0) & schema.max_value(segment)
}

/// Pack field values into a snowflake.
///
/// `timestamp` defaults to the current wall-clock time and is truncated to
/// whole milliseconds.
pub fn pack(
    schema: &Schema,
    timestamp: Option<DateTime<Utc>>,
    param1: u64,
    param2: u64,
    sequence: u64,
) -> Result<u64> {
    let timestamp = timestamp.unwrap_or_else(Utc::now);
    let elapsed = elapsed_ms(schema, timestamp)?;
    let param1 = check_field(schema, Segment::Param1, param1)?;
    let param2 = check_field(schema, Segment::Param2, param2)?;
    let sequence = check_field(schema, Segment::Sequence, sequence)?;

    let id = place(schema, Segment::Timestamp, elapsed)
        | place(schema, Segment::Param1, param1)
        | place(schema, Segment::Param2, param2)
        | place(schema, Segment::Sequence, sequence);

    trace!(epoch = %schema.epoch(), elapsed, param1, param2, sequence, id, "packed snowflake");
    Ok(id)
}

pub fn pack_parts(schema: &Schema, parts: &SnowflakeParts) -> Result<u64> {
    pack(
        schema,
        Some(parts.timestamp),
        parts.param1,
        parts.param2,
        parts.sequence,
    )
}

/// Split a snowflake into its field values.
///
/// Fails with [`SnowflakeError::ValueRange`] when the decoded timestamp is
/// outside what `DateTime<Utc>` can represent.
pub fn unpack(schema: &Schema, value: u64) -> Result<SnowflakeParts> {
    let elapsed = extract(schema, Segment::Timestamp, value);
    let timestamp = i64::try_from(elapsed)
        .ok()
        .and_then(|elapsed| schema.epoch_ms().checked_add(elapsed))
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| SnowflakeError::ValueRange(value.to_string()))?;

    let parts = SnowflakeParts {
        timestamp,
        param1: extract(schema, Segment::Param1, value),
        param2: extract(schema, Segment::Param2, value),
        sequence: extract(schema, Segment::Sequence, value),
    };
    trace!(epoch = %schema.epoch(), value, ?parts, "unpacked snowflake");
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DISCORD_EPOCH, Epoch, Preset};
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_discord_vector() {
        let schema = Preset::Discord.schema();
        let date = at(2022, 1, 1, 16, 15);
        let id = pack(schema, Some(date), 5, 5, 222).unwrap();
        assert_eq!(id, 926_871_139_123_876_062);

        let parts = unpack(schema, id).unwrap();
        assert_eq!(parts.timestamp, date);
        assert_eq!((parts.param1, parts.param2, parts.sequence), (5, 5, 222));
    }

    #[test]
    fn test_twitter_vector() {
        let schema = Preset::Twitter.schema();
        let date = at(2022, 1, 1, 16, 15);
        let id = pack(schema, Some(date), 333, 0, 666).unwrap();
        assert_eq!(id, 1_477_312_408_582_410_906);
        assert_eq!(id >> 63, 0);

        let parts = unpack(schema, id).unwrap();
        assert_eq!(parts.timestamp, date);
        assert_eq!((parts.param1, parts.param2, parts.sequence), (333, 0, 666));
    }

    #[test]
    fn test_instagram_vector() {
        let schema = Preset::Instagram.schema();
        let date = at(2020, 6, 11, 8, 13);
        let id = pack(schema, Some(date), 1605, 0, 420).unwrap();
        assert_eq!(id, 2_329_039_618_686_129_572);

        let parts = unpack(schema, id).unwrap();
        assert_eq!(parts.timestamp, date);
        assert_eq!((parts.param1, parts.sequence), (1605, 420));
    }

    #[test]
    fn test_sequence_boundary() {
        let schema = Preset::Discord.schema();
        let date = at(2022, 1, 1, 0, 0);
        assert!(pack(schema, Some(date), 0, 0, 4095).is_ok());
        assert!(matches!(
            pack(schema, Some(date), 0, 0, 4096),
            Err(SnowflakeError::FieldOverflow {
                field: Segment::Sequence,
                value: 4096,
                width: 12
            })
        ));
        assert!(matches!(
            pack(schema, Some(date), 32, 0, 0),
            Err(SnowflakeError::FieldOverflow {
                field: Segment::Param1,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_width_field_accepts_only_zero() {
        let schema = Preset::Twitter.schema();
        let date = at(2022, 1, 1, 0, 0);
        assert!(matches!(
            pack(schema, Some(date), 1, 1, 1),
            Err(SnowflakeError::FieldOverflow {
                field: Segment::Param2,
                value: 1,
                width: 0
            })
        ));
        let id = pack(schema, Some(date), 1023, 0, 4095).unwrap();
        assert_eq!(unpack(schema, id).unwrap().param2, 0);
        assert_eq!(unpack(schema, u64::MAX).unwrap().param2, 0);
    }

    #[test]
    fn test_before_epoch() {
        let schema = Preset::Discord.schema();
        let before = DateTime::from_timestamp_millis(DISCORD_EPOCH - 1).unwrap();
        assert!(matches!(
            pack(schema, Some(before), 0, 0, 0),
            Err(SnowflakeError::BeforeEpoch { .. })
        ));
        let epoch = DateTime::from_timestamp_millis(DISCORD_EPOCH).unwrap();
        assert_eq!(pack(schema, Some(epoch), 0, 0, 1).unwrap(), 1);
    }

    #[test]
    fn test_timestamp_overflow() {
        let schema = Schema::new(Epoch::Millis(0), 0, 20, 20, 12, 12).unwrap();
        let last = DateTime::from_timestamp_millis((1 << 20) - 1).unwrap();
        let id = pack(&schema, Some(last), 0, 0, 0).unwrap();
        assert_eq!(unpack(&schema, id).unwrap().timestamp, last);

        let past = DateTime::from_timestamp_millis(1 << 20).unwrap();
        assert!(matches!(
            pack(&schema, Some(past), 0, 0, 0),
            Err(SnowflakeError::TimestampOverflow {
                elapsed_ms: 1_048_576,
                width: 20
            })
        ));
    }

    #[test]
    fn test_leading_bit_ignored_on_unpack() {
        let schema = Preset::Twitter.schema();
        let id = pack(schema, Some(at(2023, 5, 1, 12, 0)), 7, 0, 9).unwrap();
        assert_eq!(
            unpack(schema, id | (1 << 63)).unwrap(),
            unpack(schema, id).unwrap()
        );
    }

    #[test]
    fn test_truncates_to_milliseconds() {
        let schema = Preset::Discord.schema();
        let precise = at(2022, 1, 1, 0, 0) + chrono::Duration::microseconds(1_500);
        let id = pack(schema, Some(precise), 0, 0, 0).unwrap();
        let parts = unpack(schema, id).unwrap();
        assert_eq!(parts.timestamp_ms(), precise.timestamp_millis());
        assert_eq!(parts.timestamp.timestamp_subsec_micros(), 1_000);
    }

    #[test]
    fn test_default_timestamp_is_now() {
        let schema = Preset::Discord.schema();
        let before = Utc::now().timestamp_millis();
        let id = pack(schema, None, 1, 2, 3).unwrap();
        let after = Utc::now().timestamp_millis();
        let parts = unpack(schema, id).unwrap();
        assert!(parts.timestamp_ms() >= before && parts.timestamp_ms() <= after);
    }

    #[test]
    fn test_full_width_segments() {
        let all_sequence = Schema::new(Epoch::Millis(0), 0, 0, 0, 0, 64).unwrap();
        let id = pack(&all_sequence, Some(at(1970, 1, 1, 0, 0)), 0, 0, u64::MAX).unwrap();
        assert_eq!(id, u64::MAX);
        assert_eq!(unpack(&all_sequence, id).unwrap().sequence, u64::MAX);

        let all_time = Schema::new(Epoch::Millis(0), 0, 64, 0, 0, 0).unwrap();
        assert!(matches!(
            unpack(&all_time, u64::MAX),
            Err(SnowflakeError::ValueRange(_))
        ));
    }

    #[test]
    fn test_pack_parts_matches_pack() {
        let schema = Preset::Discord.schema();
        let parts = SnowflakeParts {
            timestamp: at(2024, 2, 29, 23, 59),
            param1: 31,
            param2: 0,
            sequence: 17,
        };
        let id = pack_parts(schema, &parts).unwrap();
        assert_eq!(id, pack(schema, Some(parts.timestamp), 31, 0, 17).unwrap());
        assert_eq!(unpack(schema, id).unwrap(), parts);
    }

    #[test]
    fn test_checked_field() {
        let schema = Preset::Discord.schema();
        assert_eq!(checked_field(schema, Segment::Param1, 31).unwrap(), 31);
        assert!(matches!(
            checked_field(schema, Segment::Param1, -1),
            Err(SnowflakeError::FieldOverflow { value: -1, .. })
        ));
        assert!(checked_field(schema, Segment::Param2, 32).is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("926871139123876062").unwrap(), 926_871_139_123_876_062);
        assert_eq!(parse_value(" 42\n").unwrap(), 42);
        assert_eq!(parse_value("18446744073709551615").unwrap(), u64::MAX);
        for bad in ["", "-1", "0x10", "12a", "18446744073709551616", "123456789012345678901"] {
            assert!(
                matches!(parse_value(bad), Err(SnowflakeError::ValueRange(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
