//! What a hook runs for

use crate::error::{HookError, HookResult};
use crate::kind::Kind;
use std::collections::BTreeMap;

/// Relation settings of one member unit
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Details needed to run one hook
///
/// Which fields must be set depends on the kind; see [`Info::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub kind: Kind,
    /// Relation the hook runs for; relation hooks only
    pub relation_id: Option<i64>,
    /// Unit whose change triggered the hook; relation hooks other than broken
    pub remote_unit: Option<String>,
    /// Latest settings version seen for the remote unit
    pub change_version: Option<i64>,
    /// Units to treat as present in the relation, with their settings when
    /// already known. Settings are never persisted.
    pub members: BTreeMap<String, Option<Settings>>,
}

impl Info {
    /// Info for a hook that concerns the unit as a whole
    pub fn unit(kind: Kind) -> Self {
        Self {
            kind,
            relation_id: None,
            remote_unit: None,
            change_version: None,
            members: BTreeMap::new(),
        }
    }

    /// Info for a relation hook triggered by `remote_unit`
    pub fn relation(kind: Kind, relation_id: i64, remote_unit: &str, change_version: i64) -> Self {
        Self {
            kind,
            relation_id: Some(relation_id),
            remote_unit: Some(remote_unit.to_string()),
            change_version: Some(change_version),
            members: BTreeMap::new(),
        }
    }

    /// Info for the relation-broken hook
    pub fn relation_broken(relation_id: i64) -> Self {
        Self {
            relation_id: Some(relation_id),
            ..Self::unit(Kind::RelationBroken)
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Settings>)>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    /// Check that exactly the fields this kind needs are set
    pub fn validate(&self) -> HookResult<()> {
        let kind = self.kind;
        let invalid = |what: &str| Err(HookError::InvalidInfo(format!("{} hook {}", kind, what)));

        if !kind.is_relation() {
            if self.relation_id.is_some()
                || self.remote_unit.is_some()
                || self.change_version.is_some()
                || !self.members.is_empty()
            {
                return invalid("cannot carry relation details");
            }
            return Ok(());
        }

        if self.relation_id.is_none() {
            return invalid("requires a relation id");
        }
        if kind.has_remote_unit() {
            match self.remote_unit.as_deref() {
                None | Some("") => return invalid("requires a remote unit"),
                Some(_) => {}
            }
            if self.change_version.is_none() {
                return invalid("requires a change version");
            }
        } else if self.remote_unit.is_some() || self.change_version.is_some() {
            return invalid("cannot name a remote unit");
        }
        Ok(())
    }
}
