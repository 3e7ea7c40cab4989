//! Record, group and container identities
//!
//! Identities are tagged: a record minted on this device carries a
//! [`RecordId::Temporary`] until the remote store accepts its creation and
//! hands back a [`RecordId::Durable`] one. String prefixes are only consulted
//! when parsing untyped input; persisted rows carry an explicit [`IdKind`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Prefix of locally-minted record IDs (`temp-<unix-ms>-<random>`)
pub const TEMPORARY_RECORD_PREFIX: &str = "temp-";

/// Prefix of locally-minted group IDs (`temp-tab-<unix-ms>-<random>`)
pub const TEMPORARY_GROUP_PREFIX: &str = "temp-tab-";

/// Sentinel group ID of the fixed, non-deletable pseudo-category
pub const STAPLE_GROUP_ID: &str = "staple";

/// Prefix of queue keys injected for diagnostics; never sent to the remote store
pub const DIAGNOSTIC_PREFIX: &str = "__diag__";

const RANDOM_SUFFIX_LEN: usize = 5;

/// Storage tag for an identity column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Temporary,
    Durable,
    Staple,
    Diagnostic,
}

impl IdKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Durable => "durable",
            Self::Staple => "staple",
            Self::Diagnostic => "diagnostic",
        }
    }
}

impl FromStr for IdKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporary" => Ok(Self::Temporary),
            "durable" => Ok(Self::Durable),
            "staple" => Ok(Self::Staple),
            "diagnostic" => Ok(Self::Diagnostic),
            other => Err(Error::InvalidInput(format!("unknown id kind '{other}'"))),
        }
    }
}

fn mint(prefix: &str) -> String {
    let now = chrono::Utc::now().timestamp_millis();
    let random = Uuid::now_v7().simple().to_string();
    let suffix = &random[random.len() - RANDOM_SUFFIX_LEN..];
    format!("{prefix}{now}-{suffix}")
}

/// Identity of a note record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RecordId {
    /// Minted on this device, unknown to the remote store
    Temporary(String),
    /// Assigned by the remote store
    Durable(String),
}

impl RecordId {
    /// Mint a new temporary ID of the shape `temp-<unix-ms>-<random>`
    #[must_use]
    pub fn mint_temporary() -> Self {
        Self::Temporary(mint(TEMPORARY_RECORD_PREFIX))
    }

    pub fn durable(id: impl Into<String>) -> Self {
        Self::Durable(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Temporary(id) | Self::Durable(id) => id,
        }
    }

    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    pub const fn kind(&self) -> IdKind {
        match self {
            Self::Temporary(_) => IdKind::Temporary,
            Self::Durable(_) => IdKind::Durable,
        }
    }

    /// Rebuild an ID from its persisted column pair
    pub fn from_parts(kind: IdKind, id: String) -> Result<Self, Error> {
        match kind {
            IdKind::Temporary => Ok(Self::Temporary(id)),
            IdKind::Durable => Ok(Self::Durable(id)),
            other => Err(Error::InvalidInput(format!(
                "'{}' is not a record id kind",
                other.as_str()
            ))),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidInput("record id must not be empty".into()));
        }
        if s.starts_with(DIAGNOSTIC_PREFIX) {
            return Err(Error::InvalidInput(format!(
                "'{s}' is a diagnostic key, not a record id"
            )));
        }
        if s.starts_with(TEMPORARY_RECORD_PREFIX) {
            Ok(Self::Temporary(s.to_string()))
        } else {
            Ok(Self::Durable(s.to_string()))
        }
    }
}

/// Identity of a group (tab) inside a notebook
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum GroupId {
    /// The fixed pseudo-category that always exists
    Staple,
    /// Minted on this device, unknown to the remote store
    Temporary(String),
    /// Assigned by the remote store
    Durable(String),
}

impl GroupId {
    /// Mint a new temporary ID of the shape `temp-tab-<unix-ms>-<random>`
    #[must_use]
    pub fn mint_temporary() -> Self {
        Self::Temporary(mint(TEMPORARY_GROUP_PREFIX))
    }

    pub fn durable(id: impl Into<String>) -> Self {
        Self::Durable(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Staple => STAPLE_GROUP_ID,
            Self::Temporary(id) | Self::Durable(id) => id,
        }
    }

    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    pub const fn kind(&self) -> IdKind {
        match self {
            Self::Staple => IdKind::Staple,
            Self::Temporary(_) => IdKind::Temporary,
            Self::Durable(_) => IdKind::Durable,
        }
    }

    pub fn from_parts(kind: IdKind, id: String) -> Result<Self, Error> {
        match kind {
            IdKind::Staple => Ok(Self::Staple),
            IdKind::Temporary => Ok(Self::Temporary(id)),
            IdKind::Durable => Ok(Self::Durable(id)),
            IdKind::Diagnostic => Err(Error::InvalidInput(
                "'diagnostic' is not a group id kind".into(),
            )),
        }
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidInput("group id must not be empty".into()));
        }
        if s == STAPLE_GROUP_ID {
            Ok(Self::Staple)
        } else if s.starts_with(TEMPORARY_GROUP_PREFIX) {
            Ok(Self::Temporary(s.to_string()))
        } else {
            Ok(Self::Durable(s.to_string()))
        }
    }
}

/// Identity of the owning notebook
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of a sync queue entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueTarget {
    Record(RecordId),
    /// Injected for tests and diagnostics; skipped by the processor
    Diagnostic(String),
}

impl QueueTarget {
    /// Build a diagnostic key carrying the given label
    pub fn diagnostic(label: &str) -> Self {
        Self::Diagnostic(format!("{DIAGNOSTIC_PREFIX}{label}"))
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Record(id) => id.as_str(),
            Self::Diagnostic(key) => key,
        }
    }

    pub const fn kind(&self) -> IdKind {
        match self {
            Self::Record(id) => id.kind(),
            Self::Diagnostic(_) => IdKind::Diagnostic,
        }
    }

    pub fn from_parts(kind: IdKind, key: String) -> Result<Self, Error> {
        match kind {
            IdKind::Diagnostic => Ok(Self::Diagnostic(key)),
            other => RecordId::from_parts(other, key).map(Self::Record),
        }
    }

    pub const fn record_id(&self) -> Option<&RecordId> {
        match self {
            Self::Record(id) => Some(id),
            Self::Diagnostic(_) => None,
        }
    }
}

impl From<RecordId> for QueueTarget {
    fn from(id: RecordId) -> Self {
        Self::Record(id)
    }
}

impl fmt::Display for QueueTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_record_id_has_temporary_shape() {
        let id = RecordId::mint_temporary();
        assert!(id.is_temporary());

        let parts: Vec<&str> = id.as_str().splitn(3, '-').collect();
        assert_eq!(parts[0], "temp");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 5);
    }

    #[test]
    fn minted_group_id_has_temporary_tab_shape() {
        let id = GroupId::mint_temporary();
        assert!(id.is_temporary());
        assert!(id.as_str().starts_with("temp-tab-"));
    }

    #[test]
    fn parse_classifies_record_ids() {
        assert_eq!(
            "temp-1700000000-abc12".parse::<RecordId>().unwrap(),
            RecordId::Temporary("temp-1700000000-abc12".into())
        );
        assert_eq!(
            "x8Fq2".parse::<RecordId>().unwrap(),
            RecordId::durable("x8Fq2")
        );
        assert!("__diag__heartbeat".parse::<RecordId>().is_err());
        assert!("  ".parse::<RecordId>().is_err());
    }

    #[test]
    fn parse_classifies_group_ids() {
        assert_eq!("staple".parse::<GroupId>().unwrap(), GroupId::Staple);
        assert!("temp-tab-1-abcde".parse::<GroupId>().unwrap().is_temporary());
        assert_eq!(
            "g-42".parse::<GroupId>().unwrap(),
            GroupId::durable("g-42")
        );
    }

    #[test]
    fn stored_kind_wins_over_prefix() {
        let id = RecordId::from_parts(IdKind::Durable, "temp-looks-local".into()).unwrap();
        assert!(!id.is_temporary());
    }

    #[test]
    fn diagnostic_target_round_trips_through_parts() {
        let target = QueueTarget::diagnostic("heartbeat");
        assert_eq!(target.key(), "__diag__heartbeat");

        let rebuilt = QueueTarget::from_parts(target.kind(), target.key().to_string()).unwrap();
        assert_eq!(rebuilt, target);
        assert!(rebuilt.record_id().is_none());
    }
}
