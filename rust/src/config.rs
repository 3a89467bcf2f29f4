//! Named-field schema configuration and its JSON form.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::schema::{Epoch, Schema};

/// Unvalidated schema description.
///
/// Field names follow the JSON surface:
///
/// ```json
/// {
///   "epoch": "twitter",
///   "leading_bit": true,
///   "timestamp_length": 41,
///   "param1_length": 10,
///   "param2_length": 0,
///   "sequence_length": 12
/// }
/// ```
///
/// `epoch` is a preset name or integer milliseconds; `leading_bit` is a
/// boolean or `0`/`1`. Missing widths fall back to the Discord layout, the
/// same as [`SchemaConfig::default`]. Validation happens in
/// [`SchemaConfig::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub epoch: Epoch,
    #[serde(default, deserialize_with = "flag_or_width")]
    pub leading_bit: i64,
    #[serde(default = "default_timestamp_length")]
    pub timestamp_length: i64,
    #[serde(default = "default_param_length")]
    pub param1_length: i64,
    #[serde(default = "default_param_length")]
    pub param2_length: i64,
    #[serde(default = "default_sequence_length")]
    pub sequence_length: i64,
}

fn default_timestamp_length() -> i64 {
    42
}

fn default_param_length() -> i64 {
    5
}

fn default_sequence_length() -> i64 {
    12
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagOrWidth {
    Flag(bool),
    Width(i64),
}

fn flag_or_width<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match FlagOrWidth::deserialize(deserializer)? {
        FlagOrWidth::Flag(flag) => i64::from(flag),
        FlagOrWidth::Width(width) => width,
    })
}

impl Default for SchemaConfig {
    /// Discord layout.
    fn default() -> Self {
        Self {
            epoch: Epoch::Discord,
            leading_bit: 0,
            timestamp_length: 42,
            param1_length: 5,
            param2_length: 5,
            sequence_length: 12,
        }
    }
}

impl SchemaConfig {
    pub fn build(&self) -> Result<Schema> {
        Ok(Schema::from_config(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    /// Read a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
