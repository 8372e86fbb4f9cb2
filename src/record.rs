use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Environment used when a caller does not name one.
pub const DEFAULT_ENVIRONMENT: &str = "prod";

/// Rollout used when a write does not carry one.
pub const DEFAULT_ROLLOUT: i64 = 100;

/// Timestamp layout of `updated_at` in persisted records: ISO-8601 in UTC,
/// microsecond precision, no offset suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// A durable flag definition. At most one record exists per `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagRecord {
    pub name: String,
    pub enabled: bool,
    pub rollout: u8,
    pub environment: String,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: DateTime<Utc>,
}

/// Write request for a single flag. `rollout` is kept wide so out-of-range
/// values reach validation instead of failing to deserialize.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagInput {
    pub name: String,
    pub enabled: bool,
    #[serde(default = "default_rollout")]
    pub rollout: i64,
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// A flag record together with one evaluated outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDecision {
    pub name: String,
    pub enabled: bool,
    pub rollout: u8,
    pub environment: String,
    pub active: bool,
}

/// On-disk shape of a flag row: `enabled` as 0/1, `updated_at` as naive
/// ISO text. Stores read and write records through this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFlag {
    pub name: String,
    pub enabled: u8,
    pub rollout: i64,
    pub environment: String,
    pub updated_at: String,
}

fn default_rollout() -> i64 {
    DEFAULT_ROLLOUT
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parses a persisted `updated_at`. Accepts values with or without a
/// fractional part.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| StoreError::Timestamp(format!("{}: {}", raw, e)))
}

impl FlagInput {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            rollout: DEFAULT_ROLLOUT,
            environment: default_environment(),
        }
    }

    pub fn rollout(mut self, rollout: i64) -> Self {
        self.rollout = rollout;
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }
}

impl CachedDecision {
    pub fn from_record(record: &FlagRecord, active: bool) -> Self {
        Self {
            name: record.name.clone(),
            enabled: record.enabled,
            rollout: record.rollout,
            environment: record.environment.clone(),
            active,
        }
    }
}

impl From<&FlagRecord> for StoredFlag {
    fn from(record: &FlagRecord) -> Self {
        Self {
            name: record.name.clone(),
            enabled: u8::from(record.enabled),
            rollout: i64::from(record.rollout),
            environment: record.environment.clone(),
            updated_at: format_timestamp(&record.updated_at),
        }
    }
}

impl TryFrom<StoredFlag> for FlagRecord {
    type Error = StoreError;

    fn try_from(row: StoredFlag) -> Result<Self, Self::Error> {
        let rollout = u8::try_from(row.rollout)
            .ok()
            .filter(|r| *r <= 100)
            .ok_or_else(|| {
                StoreError::Backend(format!(
                    "stored rollout {} for flag {} is out of range",
                    row.rollout, row.name
                ))
            })?;
        Ok(Self {
            updated_at: parse_timestamp(&row.updated_at)?,
            name: row.name,
            enabled: row.enabled != 0,
            rollout,
            environment: row.environment,
        })
    }
}
