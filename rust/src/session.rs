//! Stateful convenience API holding the active schema.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::codec::{self, SnowflakeParts};
use crate::error::Result;
use crate::schema::{Preset, Schema};

/// Decoded Discord snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscordSnowflake {
    pub timestamp: DateTime<Utc>,
    pub worker: u64,
    pub process: u64,
    pub sequence: u64,
}

/// Decoded Twitter snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TwitterSnowflake {
    pub timestamp: DateTime<Utc>,
    pub machine: u64,
    pub sequence: u64,
}

/// Decoded Instagram snowflake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstagramSnowflake {
    pub timestamp: DateTime<Utc>,
    pub shard: u64,
    pub sequence: u64,
}

/// Snowflake generator and parser bound to a replaceable schema.
///
/// The schema is swapped as a whole on [`set_config`](Self::set_config);
/// readers always see either the old or the new schema. Readers hold the
/// read lock only while cloning the `Arc<Schema>`; packing and unpacking
/// run on that clone with no lock held, so a writer never waits on codec
/// work. Preset operations use the preset layout and leave the configured
/// schema untouched.
///
/// ```
/// use snowflake::{Preset, Snowflake};
///
/// let session = Snowflake::new(*Preset::Instagram.schema());
/// let id = session.generate_snowflake(12, 0, 7, None).unwrap();
/// let parts = session.parse_snowflake(id).unwrap();
/// assert_eq!((parts.param1, parts.sequence), (12, 7));
/// ```
#[derive(Debug)]
pub struct Snowflake {
    config: RwLock<Arc<Schema>>,
}

impl Default for Snowflake {
    /// Session using the Discord layout.
    fn default() -> Self {
        Self::new(Schema::default())
    }
}

impl Snowflake {
    pub fn new(schema: Schema) -> Self {
        Self {
            config: RwLock::new(Arc::new(schema)),
        }
    }

    /// Current schema.
    pub fn get_config(&self) -> Arc<Schema> {
        Arc::clone(&self.config.read())
    }

    /// Replace the current schema.
    pub fn set_config(&self, schema: Schema) {
        let next = Arc::new(schema);
        let previous = std::mem::replace(&mut *self.config.write(), next);
        debug!(?previous, current = ?schema, "replaced snowflake schema");
    }

    /// Generate a snowflake with the configured schema.
    pub fn generate_snowflake(
        &self,
        param1: u64,
        param2: u64,
        sequence: u64,
        date: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        codec::pack(&self.get_config(), date, param1, param2, sequence)
    }

    /// Parse a snowflake with the configured schema.
    pub fn parse_snowflake(&self, value: u64) -> Result<SnowflakeParts> {
        codec::unpack(&self.get_config(), value)
    }

    /// Parse decimal snowflake text with the configured schema.
    pub fn parse_snowflake_str(&self, value: &str) -> Result<SnowflakeParts> {
        self.parse_snowflake(codec::parse_value(value)?)
    }

    pub fn generate_discord_snowflake(
        &self,
        worker: u64,
        process: u64,
        sequence: u64,
        date: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        codec::pack(Preset::Discord.schema(), date, worker, process, sequence)
    }

    pub fn parse_discord_snowflake(&self, value: u64) -> Result<DiscordSnowflake> {
        let parts = codec::unpack(Preset::Discord.schema(), value)?;
        Ok(DiscordSnowflake {
            timestamp: parts.timestamp,
            worker: parts.param1,
            process: parts.param2,
            sequence: parts.sequence,
        })
    }

    pub fn parse_discord_snowflake_str(&self, value: &str) -> Result<DiscordSnowflake> {
        self.parse_discord_snowflake(codec::parse_value(value)?)
    }

    pub fn generate_twitter_snowflake(
        &self,
        machine: u64,
        sequence: u64,
        date: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        codec::pack(Preset::Twitter.schema(), date, machine, 0, sequence)
    }

    pub fn parse_twitter_snowflake(&self, value: u64) -> Result<TwitterSnowflake> {
        let parts = codec::unpack(Preset::Twitter.schema(), value)?;
        Ok(TwitterSnowflake {
            timestamp: parts.timestamp,
            machine: parts.param1,
            sequence: parts.sequence,
        })
    }

    pub fn parse_twitter_snowflake_str(&self, value: &str) -> Result<TwitterSnowflake> {
        self.parse_twitter_snowflake(codec::parse_value(value)?)
    }

    pub fn generate_instagram_snowflake(
        &self,
        shard: u64,
        sequence: u64,
        date: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        codec::pack(Preset::Instagram.schema(), date, shard, 0, sequence)
    }

    pub fn parse_instagram_snowflake(&self, value: u64) -> Result<InstagramSnowflake> {
        let parts = codec::unpack(Preset::Instagram.schema(), value)?;
        Ok(InstagramSnowflake {
            timestamp: parts.timestamp,
            shard: parts.param1,
            sequence: parts.sequence,
        })
    }

    pub fn parse_instagram_snowflake_str(&self, value: &str) -> Result<InstagramSnowflake> {
        self.parse_instagram_snowflake(codec::parse_value(value)?)
    }
}
