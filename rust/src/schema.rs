//! Snowflake bit layouts.
//!
//! A [`Schema`] splits a 64-bit integer, from most to least significant bit,
//! into:
//!
//! ```text
//! +-------------+-----------+--------+--------+----------+
//! | leading 0/1 | timestamp | param1 | param2 | sequence |
//! +-------------+-----------+--------+--------+----------+
//! |<---- MSB ------------ 64 bits ------------- LSB ---->|
//! ```
//!
//! The timestamp segment holds milliseconds elapsed since the schema's epoch.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SchemaConfig;
use crate::error::ConfigError;

/// Discord epoch, 2015-01-01T00:00:00Z.
pub const DISCORD_EPOCH: i64 = 1_420_070_400_000;
/// Twitter epoch, 2010-11-04T01:42:54.657Z.
pub const TWITTER_EPOCH: i64 = 1_288_834_974_657;
/// Instagram epoch, 2011-08-24T21:07:01.721Z.
pub const INSTAGRAM_EPOCH: i64 = 1_314_220_021_721;

/// Epochs are limited to 13 decimal digits of milliseconds.
const MAX_EPOCH_MS: i64 = 9_999_999_999_999;

/// Reference point for a schema's timestamp segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "EpochRepr", into = "EpochRepr")]
pub enum Epoch {
    Discord,
    Twitter,
    Instagram,
    /// Milliseconds since the Unix epoch.
    Millis(i64),
}

impl Epoch {
    pub fn as_millis(self) -> i64 {
        match self {
            Self::Discord => DISCORD_EPOCH,
            Self::Twitter => TWITTER_EPOCH,
            Self::Instagram => INSTAGRAM_EPOCH,
            Self::Millis(ms) => ms,
        }
    }

    /// Preset name, if this is a named epoch.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::Discord => Some("discord"),
            Self::Twitter => Some("twitter"),
            Self::Instagram => Some("instagram"),
            Self::Millis(_) => None,
        }
    }
}

impl From<i64> for Epoch {
    fn from(ms: i64) -> Self {
        Self::Millis(ms)
    }
}

impl From<Preset> for Epoch {
    fn from(preset: Preset) -> Self {
        match preset {
            Preset::Discord => Self::Discord,
            Preset::Twitter => Self::Twitter,
            Preset::Instagram => Self::Instagram,
        }
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.as_millis()),
        }
    }
}

impl FromStr for Epoch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(preset) = Preset::parse(s) {
            return Ok(preset.into());
        }
        s.parse::<i64>()
            .map(Self::Millis)
            .map_err(|_| ConfigError::UnknownEpoch(s.to_string()))
    }
}

/// Wire form of [`Epoch`]: a preset name or integer milliseconds.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum EpochRepr {
    Millis(i64),
    Name(String),
}

impl TryFrom<EpochRepr> for Epoch {
    type Error = ConfigError;

    fn try_from(repr: EpochRepr) -> Result<Self, Self::Error> {
        match repr {
            EpochRepr::Millis(ms) => Ok(Self::Millis(ms)),
            EpochRepr::Name(name) => name.parse(),
        }
    }
}

impl From<Epoch> for EpochRepr {
    fn from(epoch: Epoch) -> Self {
        match epoch.name() {
            Some(name) => Self::Name(name.to_string()),
            None => Self::Millis(epoch.as_millis()),
        }
    }
}

/// Well-known platform layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// 42-bit timestamp, 5-bit worker, 5-bit process, 12-bit sequence.
    Discord,
    /// Reserved bit, 41-bit timestamp, 10-bit machine, 12-bit sequence.
    Twitter,
    /// 41-bit timestamp, 13-bit shard, 10-bit sequence.
    Instagram,
}

static DISCORD: Lazy<Schema> = Lazy::new(|| preset_schema(Preset::Discord, 0, 42, 5, 5, 12));
static TWITTER: Lazy<Schema> = Lazy::new(|| preset_schema(Preset::Twitter, 1, 41, 10, 0, 12));
static INSTAGRAM: Lazy<Schema> =
    Lazy::new(|| preset_schema(Preset::Instagram, 0, 41, 13, 0, 10));

fn preset_schema(
    preset: Preset,
    leading_bit: i64,
    timestamp: i64,
    param1: i64,
    param2: i64,
    sequence: i64,
) -> Schema {
    let schema = Schema::new(
        preset.into(),
        leading_bit,
        timestamp,
        param1,
        param2,
        sequence,
    )
    .expect("preset layouts sum to 64 bits");
    debug!(preset = preset.as_str(), ?schema, "initialised preset schema");
    schema
}

impl Preset {
    pub const ALL: [Preset; 3] = [Self::Discord, Self::Twitter, Self::Instagram];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "discord" => Some(Self::Discord),
            "twitter" => Some(Self::Twitter),
            "instagram" => Some(Self::Instagram),
            _ => None,
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            Self::Discord => &DISCORD,
            Self::Twitter => &TWITTER,
            Self::Instagram => &INSTAGRAM,
        }
    }
}

/// One of the five fixed-position bit segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    LeadingBit,
    Timestamp,
    Param1,
    Param2,
    Sequence,
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeadingBit => "leading_bit",
            Self::Timestamp => "timestamp",
            Self::Param1 => "param1",
            Self::Param2 => "param2",
            Self::Sequence => "sequence",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a segment inside the packed integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentLayout {
    pub segment: Segment,
    pub width: u32,
    /// Bit index of the segment's least significant bit.
    pub shift: u32,
    /// Unshifted mask, `2^width - 1`.
    pub mask: u64,
}

/// Largest value representable in `width` bits.
pub(crate) const fn max_for(width: u32) -> u64 {
    if width >= u64::BITS {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Immutable bit layout plus epoch.
///
/// Built only through [`Schema::new`] (or [`Schema::from_config`]), so every
/// instance satisfies `leading + timestamp + param1 + param2 + sequence == 64`
/// and has an epoch in `0..10^13` milliseconds.
///
/// Equality and hashing compare the epoch by its millisecond value, so
/// `Epoch::Millis(DISCORD_EPOCH)` and `Epoch::Discord` give equal schemas.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    epoch: Epoch,
    leading_bit_width: u32,
    timestamp_width: u32,
    param1_width: u32,
    param2_width: u32,
    sequence_width: u32,
}

impl Schema {
    fn key(&self) -> (i64, [u32; 5]) {
        (
            self.epoch.as_millis(),
            [
                self.leading_bit_width,
                self.timestamp_width,
                self.param1_width,
                self.param2_width,
                self.sequence_width,
            ],
        )
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl Schema {
    /// Validate widths and epoch, returning the schema on success.
    pub fn new(
        epoch: Epoch,
        leading_bit_width: i64,
        timestamp_width: i64,
        param1_width: i64,
        param2_width: i64,
        sequence_width: i64,
    ) -> Result<Self, ConfigError> {
        let widths = [
            (Segment::Timestamp, timestamp_width),
            (Segment::Param1, param1_width),
            (Segment::Param2, param2_width),
            (Segment::Sequence, sequence_width),
        ];
        if let Some(&(segment, width)) = widths.iter().find(|(_, w)| *w < 0) {
            return Err(ConfigError::NegativeWidth { segment, width });
        }
        if !(0..=1).contains(&leading_bit_width) {
            return Err(ConfigError::LeadingBit(leading_bit_width));
        }

        let total = i128::from(leading_bit_width)
            + widths.iter().map(|&(_, w)| i128::from(w)).sum::<i128>();
        if total != i128::from(u64::BITS) {
            return Err(ConfigError::WidthSum(total));
        }

        let epoch_ms = epoch.as_millis();
        if !(0..=MAX_EPOCH_MS).contains(&epoch_ms) {
            return Err(ConfigError::Epoch(epoch_ms));
        }

        // Every width is now in 0..=64.
        Ok(Self {
            epoch,
            leading_bit_width: leading_bit_width as u32,
            timestamp_width: timestamp_width as u32,
            param1_width: param1_width as u32,
            param2_width: param2_width as u32,
            sequence_width: sequence_width as u32,
        })
    }

    pub fn from_config(config: &SchemaConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.epoch,
            config.leading_bit,
            config.timestamp_length,
            config.param1_length,
            config.param2_length,
            config.sequence_length,
        )
    }

    /// The configuration record this schema was built from.
    pub fn config(&self) -> SchemaConfig {
        SchemaConfig {
            epoch: self.epoch,
            leading_bit: i64::from(self.leading_bit_width),
            timestamp_length: i64::from(self.timestamp_width),
            param1_length: i64::from(self.param1_width),
            param2_length: i64::from(self.param2_width),
            sequence_length: i64::from(self.sequence_width),
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn epoch_ms(&self) -> i64 {
        self.epoch.as_millis()
    }

    pub fn leading_bit_width(&self) -> u32 {
        self.leading_bit_width
    }

    pub fn timestamp_width(&self) -> u32 {
        self.timestamp_width
    }

    pub fn param1_width(&self) -> u32 {
        self.param1_width
    }

    pub fn param2_width(&self) -> u32 {
        self.param2_width
    }

    pub fn sequence_width(&self) -> u32 {
        self.sequence_width
    }

    pub fn width(&self, segment: Segment) -> u32 {
        match segment {
            Segment::LeadingBit => self.leading_bit_width,
            Segment::Timestamp => self.timestamp_width,
            Segment::Param1 => self.param1_width,
            Segment::Param2 => self.param2_width,
            Segment::Sequence => self.sequence_width,
        }
    }

    /// Bit index of the segment's least significant bit.
    pub fn shift(&self, segment: Segment) -> u32 {
        match segment {
            Segment::Sequence => 0,
            Segment::Param2 => self.sequence_width,
            Segment::Param1 => self.sequence_width + self.param2_width,
            Segment::Timestamp => self.sequence_width + self.param2_width + self.param1_width,
            Segment::LeadingBit => u64::BITS - self.leading_bit_width,
        }
    }

    pub fn max_value(&self, segment: Segment) -> u64 {
        max_for(self.width(segment))
    }

    /// Largest number of milliseconds after the epoch the schema can hold.
    pub fn max_timestamp_ms(&self) -> u64 {
        self.max_value(Segment::Timestamp)
    }

    pub fn max_param1(&self) -> u64 {
        self.max_value(Segment::Param1)
    }

    pub fn max_param2(&self) -> u64 {
        self.max_value(Segment::Param2)
    }

    pub fn max_sequence(&self) -> u64 {
        self.max_value(Segment::Sequence)
    }

    /// Last instant the schema can encode, if chrono can represent it.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        let max = i64::try_from(self.max_timestamp_ms()).ok()?;
        let ms = self.epoch_ms().checked_add(max)?;
        DateTime::from_timestamp_millis(ms)
    }

    /// Segments from most to least significant bit.
    pub fn layout(&self) -> [SegmentLayout; 5] {
        [
            Segment::LeadingBit,
            Segment::Timestamp,
            Segment::Param1,
            Segment::Param2,
            Segment::Sequence,
        ]
        .map(|segment| SegmentLayout {
            segment,
            width: self.width(segment),
            shift: self.shift(segment),
            mask: self.max_value(segment),
        })
    }
}

impl Default for Schema {
    fn default() -> Self {
        *Preset::Discord.schema()
    }
}

impl TryFrom<SchemaConfig> for Schema {
    type Error = ConfigError;

    fn try_from(config: SchemaConfig) -> Result<Self, Self::Error> {
        Self::from_config(&config)
    }
}

impl TryFrom<&SchemaConfig> for Schema {
    type Error = ConfigError;

    fn try_from(config: &SchemaConfig) -> Result<Self, Self::Error> {
        Self::from_config(config)
    }
}
