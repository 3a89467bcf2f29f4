//! snowflake-util: generate and parse snowflake identifiers.
//!
//! A snowflake is a 64-bit unsigned integer holding a millisecond timestamp
//! (relative to a per-schema epoch) and up to three auxiliary fields in fixed
//! bit segments. Discord, Twitter and Instagram layouts ship as presets; any
//! other layout can be described with a [`SchemaConfig`].
//!
//! # Layout
//!
//! ```text
//! leading bit | timestamp | param1 | param2 | sequence      (MSB -> LSB)
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use snowflake::Snowflake;
//!
//! let session = Snowflake::default();
//! let date = Utc.with_ymd_and_hms(2022, 1, 1, 16, 15, 0).unwrap();
//! let id = session.generate_discord_snowflake(5, 5, 222, Some(date)).unwrap();
//! assert_eq!(id, 926871139123876062);
//!
//! let parsed = session.parse_discord_snowflake(id).unwrap();
//! assert_eq!((parsed.worker, parsed.process, parsed.sequence), (5, 5, 222));
//! assert_eq!(parsed.timestamp, date);
//! ```

mod codec;
mod config;
mod error;
mod schema;
mod session;

pub use codec::{SnowflakeParts, checked_field, pack, pack_parts, parse_value, unpack};
pub use config::SchemaConfig;
pub use error::{ConfigError, Result, SnowflakeError};
pub use schema::{
    DISCORD_EPOCH, Epoch, INSTAGRAM_EPOCH, Preset, Schema, Segment, SegmentLayout, TWITTER_EPOCH,
};
pub use session::{DiscordSnowflake, InstagramSnowflake, Snowflake, TwitterSnowflake};
