//! Hook kinds and execution status

use crate::error::{HookError, HookResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The hooks a unit agent knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kind {
    Install,
    Start,
    ConfigChanged,
    UpgradeCharm,
    RelationJoined,
    RelationChanged,
    RelationDeparted,
    RelationBroken,
}

impl Kind {
    pub const ALL: [Kind; 8] = [
        Kind::Install,
        Kind::Start,
        Kind::ConfigChanged,
        Kind::UpgradeCharm,
        Kind::RelationJoined,
        Kind::RelationChanged,
        Kind::RelationDeparted,
        Kind::RelationBroken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Install => "install",
            Kind::Start => "start",
            Kind::ConfigChanged => "config-changed",
            Kind::UpgradeCharm => "upgrade-charm",
            Kind::RelationJoined => "relation-joined",
            Kind::RelationChanged => "relation-changed",
            Kind::RelationDeparted => "relation-departed",
            Kind::RelationBroken => "relation-broken",
        }
    }

    /// Whether the hook runs on behalf of a relation
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            Kind::RelationJoined | Kind::RelationChanged | Kind::RelationDeparted | Kind::RelationBroken
        )
    }

    /// Whether the hook is triggered by a specific remote unit
    pub fn has_remote_unit(&self) -> bool {
        self.is_relation() && *self != Kind::RelationBroken
    }

    /// File name of the hook program
    ///
    /// Relation hooks are prefixed with the relation name, as in
    /// `db-relation-joined`, and have no name without one.
    pub fn hook_name(&self, relation: Option<&str>) -> HookResult<String> {
        match relation {
            Some(relation) if self.is_relation() => Ok(format!("{}-{}", relation, self)),
            None if self.is_relation() => Err(HookError::InvalidInfo(format!(
                "{} hook needs a relation name",
                self
            ))),
            _ => Ok(self.to_string()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown hook kind {:?}", s))
    }
}

/// How far execution of the latest hook got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The agent was about to run the hook; it may have been interrupted
    Started,
    /// The hook ran to completion but local state may be out of sync
    Succeeded,
    /// The hook ran and local state has been synchronised
    Committed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Started => "started",
            Status::Succeeded => "succeeded",
            Status::Committed => "committed",
        })
    }
}
