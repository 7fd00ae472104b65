use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Authorization tier of an API key and classification of a knowledge record.
/// A key may read every record whose level is at or below its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum AccessLevel {
    Public,
    Internal,
    Confidential,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("access level must be one of 1, 2, 3, 4 (got {0})")]
pub struct InvalidAccessLevel(pub String);

impl AccessLevel {
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::Public,
        AccessLevel::Internal,
        AccessLevel::Confidential,
        AccessLevel::Admin,
    ];

    pub fn as_int(self) -> i64 {
        match self {
            AccessLevel::Public => 1,
            AccessLevel::Internal => 2,
            AccessLevel::Confidential => 3,
            AccessLevel::Admin => 4,
        }
    }

    pub fn from_int(value: i64) -> Option<Self> {
        match value {
            1 => Some(AccessLevel::Public),
            2 => Some(AccessLevel::Internal),
            3 => Some(AccessLevel::Confidential),
            4 => Some(AccessLevel::Admin),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AccessLevel::Public => "L1",
            AccessLevel::Internal => "L2",
            AccessLevel::Confidential => "L3",
            AccessLevel::Admin => "L4",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Internal => "internal",
            AccessLevel::Confidential => "confidential",
            AccessLevel::Admin => "admin",
        }
    }

    pub fn can_read(self, record_level: AccessLevel) -> bool {
        record_level <= self
    }

    pub fn is_admin(self) -> bool {
        self == AccessLevel::Admin
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<i64> for AccessLevel {
    type Error = InvalidAccessLevel;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        AccessLevel::from_int(value).ok_or_else(|| InvalidAccessLevel(value.to_string()))
    }
}

impl From<AccessLevel> for i64 {
    fn from(level: AccessLevel) -> Self {
        level.as_int()
    }
}

/// Accepts `3`, `L3`, `l3` or the level name (`confidential`).
impl FromStr for AccessLevel {
    type Err = InvalidAccessLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let numeric = trimmed
            .strip_prefix('L')
            .or_else(|| trimmed.strip_prefix('l'))
            .unwrap_or(trimmed);
        if let Ok(value) = numeric.parse::<i64>() {
            return AccessLevel::from_int(value).ok_or_else(|| InvalidAccessLevel(s.to_string()));
        }
        AccessLevel::ALL
            .into_iter()
            .find(|level| level.description().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| InvalidAccessLevel(s.to_string()))
    }
}

impl ToSql for AccessLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_int()))
    }
}

impl FromSql for AccessLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        AccessLevel::from_int(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}
