// SPDX-License-Identifier: Apache-2.0
//! The leader version: `"<session>.<counter>"`, persisted under
//! `cluster:leader_version`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a leader version string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionParseError {
    /// Missing the `.` separator between session and counter.
    #[error("malformed leader version {0:?}: missing '.' separator")]
    MissingSeparator(String),
    /// The counter half wasn't a valid non-negative integer.
    #[error("malformed leader version {0:?}: counter is not a valid integer")]
    InvalidCounter(String),
    /// The session half was empty.
    #[error("malformed leader version {0:?}: empty session")]
    EmptySession(String),
}

/// `"<session>.<counter>"`. `session` is an 8-char random identifier minted
/// per leader process; `counter` is the highest assigned instruction
/// version, or `0` while compaction is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeaderVersion {
    /// Random identifier scoping the instruction counter.
    pub session: String,
    /// Highest assigned instruction version, or 0 mid-compaction.
    pub counter: u64,
}

impl LeaderVersion {
    /// A fresh version at the start of a new session, with no instructions
    /// published yet.
    #[must_use]
    pub fn new_session(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            counter: 0,
        }
    }

    /// `true` while the leader is mid-compaction (counter reset to 0, but
    /// the session is still the live one).
    #[must_use]
    pub fn is_compacting(&self) -> bool {
        self.counter == 0
    }

    /// A copy of this version with the counter advanced to `counter`.
    #[must_use]
    pub fn with_counter(&self, counter: u64) -> Self {
        Self {
            session: self.session.clone(),
            counter,
        }
    }
}

impl fmt::Display for LeaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.session, self.counter)
    }
}

impl FromStr for LeaderVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (session, counter) = s
            .rsplit_once('.')
            .ok_or_else(|| VersionParseError::MissingSeparator(s.to_string()))?;
        if session.is_empty() {
            return Err(VersionParseError::EmptySession(s.to_string()));
        }
        let counter = counter
            .parse::<u64>()
            .map_err(|_| VersionParseError::InvalidCounter(s.to_string()))?;
        Ok(Self {
            session: session.to_string(),
            counter,
        })
    }
}

impl Serialize for LeaderVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LeaderVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let v = LeaderVersion {
            session: "abcd1234".to_string(),
            counter: 7,
        };
        let s = v.to_string();
        assert_eq!(s, "abcd1234.7");
        assert_eq!(s.parse::<LeaderVersion>().unwrap(), v);
    }

    #[test]
    fn zero_counter_means_compacting() {
        let v = LeaderVersion::new_session("sess0001");
        assert!(v.is_compacting());
        assert_eq!(v.with_counter(5).counter, 5);
        assert!(!v.with_counter(5).is_compacting());
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!("no-dot-here".parse::<LeaderVersion>().is_err());
        assert!(".5".parse::<LeaderVersion>().is_err());
        assert!("sess.notanumber".parse::<LeaderVersion>().is_err());
    }
}
