//! Units

use super::machine::MACHINES_COLLECTION;
use super::sequence::next_value;
use super::{AgentPresence, Life, TXN_ATTEMPTS, ensure_life};
use crate::context::Cluster;
use crate::error::{ConvoyError, ConvoyResult, OptionExt, ResultExt};
use crate::store::{Assert, Condition, Op, StoreError, Update, from_document, to_document};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

pub(crate) const UNITS_COLLECTION: &str = "units";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct UnitDoc {
    pub name: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
    pub life: Life,
}

/// Cached handle to a unit document
#[derive(Clone)]
pub struct Unit {
    cluster: Cluster,
    doc: UnitDoc,
}

impl Unit {
    pub(crate) fn from_doc(cluster: Cluster, doc: UnitDoc) -> Self {
        Self { cluster, doc }
    }

    /// Unit name, `<service>/<n>`
    pub fn name(&self) -> &str {
        &self.doc.name
    }

    pub fn service(&self) -> &str {
        &self.doc.service
    }

    /// Machine the unit is assigned to; subordinates have none
    pub fn machine_id(&self) -> Option<u64> {
        self.doc.machine
    }

    /// Principal of a subordinate unit
    pub fn principal(&self) -> Option<&str> {
        self.doc.principal.as_deref()
    }

    pub fn is_principal(&self) -> bool {
        self.doc.principal.is_none()
    }

    pub fn life(&self) -> Life {
        self.doc.life
    }

    pub async fn kill(&mut self) -> ConvoyResult<()> {
        self.advance(Life::Dying).await
    }

    pub async fn die(&mut self) -> ConvoyResult<()> {
        self.advance(Life::Dead).await
    }

    async fn advance(&mut self, target: Life) -> ConvoyResult<()> {
        if self.doc.life >= target {
            return Ok(());
        }
        let life = ensure_life(
            self.cluster.store().as_ref(),
            UNITS_COLLECTION,
            &self.doc.name,
            &self.to_string(),
            target,
        )
        .await?;
        self.doc.life = self.doc.life.max(life);
        Ok(())
    }

    pub async fn refresh(&mut self) -> ConvoyResult<()> {
        let doc = self
            .cluster
            .store()
            .find(UNITS_COLLECTION, &self.doc.name)
            .await?
            .or_not_found(self.to_string())
            .with_context(|| format!("cannot refresh {}", self))?;
        self.doc = from_document(doc)?;
        Ok(())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit {}", self.doc.name)
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit").field("doc", &self.doc).finish()
    }
}

impl AgentPresence for Unit {
    fn global_key(&self) -> String {
        format!("u#{}", self.doc.name)
    }

    fn cluster(&self) -> &Cluster {
        &self.cluster
    }
}

fn assert_alive(collection: &str, id: impl Into<String>) -> Op {
    Op::new(collection, id).assert(Assert::Matches(vec![Condition::eq(
        "life",
        Life::Alive.as_str(),
    )]))
}

impl Cluster {
    /// Add a unit of `service`
    ///
    /// A principal unit may be assigned to an alive `machine`; a subordinate
    /// names its alive `principal` instead. Supplying both is rejected.
    pub async fn add_unit(
        &self,
        service: &str,
        machine: Option<u64>,
        principal: Option<&str>,
    ) -> ConvoyResult<Unit> {
        if machine.is_some() && principal.is_some() {
            return Err(ConvoyError::invalid_state(format!(
                "subordinate of {} cannot be assigned to a machine",
                service
            )));
        }
        let context = || format!("cannot add unit of {}", service);

        for _ in 0..TXN_ATTEMPTS {
            let (n, claim) = next_value(self.store().as_ref(), &format!("unit-{}", service)).await?;
            let doc = UnitDoc {
                name: format!("{}/{}", service, n),
                service: service.to_string(),
                machine,
                principal: principal.map(str::to_string),
                life: Life::Alive,
            };

            let mut ops = vec![claim];
            if let Some(id) = machine {
                ops.push(assert_alive(MACHINES_COLLECTION, id.to_string()));
            }
            if let Some(name) = principal {
                ops.push(assert_alive(UNITS_COLLECTION, name));
            }
            ops.push(Op::insert(UNITS_COLLECTION, doc.name.clone(), to_document(&doc)?));

            match self.store().run(ops).await {
                Ok(()) => {
                    info!("Added unit {}", doc.name);
                    return Ok(Unit::from_doc(self.clone(), doc));
                }
                Err(StoreError::Aborted { collection, id }) => {
                    let what = match collection.as_str() {
                        MACHINES_COLLECTION => format!("machine {}", id),
                        UNITS_COLLECTION if Some(id.as_str()) == principal => format!("unit {}", id),
                        _ => continue,
                    };
                    return match self.store().find(&collection, &id).await? {
                        None => Err(ConvoyError::not_found(what).with_context(context())),
                        Some(_) => Err(ConvoyError::not_alive(what).with_context(context())),
                    };
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(ConvoyError::aborted(UNITS_COLLECTION, "?").with_context(context()))
    }

    /// Load unit `name`
    pub async fn unit(&self, name: &str) -> ConvoyResult<Unit> {
        let doc = self
            .store()
            .find(UNITS_COLLECTION, name)
            .await?
            .or_not_found(format!("unit {}", name))?;
        Ok(Unit::from_doc(self.clone(), from_document(doc)?))
    }

    /// Delete a dead unit
    pub async fn remove_unit(&self, name: &str) -> ConvoyResult<()> {
        let op = Op::new(UNITS_COLLECTION, name)
            .assert(Assert::Matches(vec![Condition::eq("life", Life::Dead.as_str())]))
            .update(Update::Remove);
        match self.store().run(vec![op]).await {
            Ok(()) => {
                info!("Removed unit {}", name);
                Ok(())
            }
            Err(StoreError::Aborted { .. }) => match self.store().find(UNITS_COLLECTION, name).await? {
                None => Err(ConvoyError::not_found(format!("unit {}", name))),
                Some(_) => Err(ConvoyError::aborted(UNITS_COLLECTION, name)
                    .with_context(format!("cannot remove unit {}: unit is not dead", name))),
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ConvoyConfig;
    use crate::error::UnifiedError;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn cluster() -> Cluster {
        Cluster::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::default()),
            ConvoyConfig::default(),
        )
        .unwrap()
    }

    fn names(units: &[Unit]) -> Vec<&str> {
        units.iter().map(Unit::name).collect()
    }

    #[tokio::test]
    async fn test_add_units_numbers_per_service() {
        let cluster = cluster();
        let m = cluster.add_machine().await.unwrap();
        let wp0 = cluster.add_unit("wordpress", Some(m.id()), None).await.unwrap();
        let wp1 = cluster.add_unit("wordpress", None, None).await.unwrap();
        let db0 = cluster.add_unit("mysql", Some(m.id()), None).await.unwrap();

        assert_eq!((wp0.name(), wp1.name(), db0.name()), ("wordpress/0", "wordpress/1", "mysql/0"));
        assert_eq!(wp0.machine_id(), Some(0));
        assert_eq!(wp1.machine_id(), None);
        assert!(wp0.is_principal());
        assert_eq!(wp0.service(), "wordpress");
        assert_eq!(cluster.unit("mysql/0").await.unwrap().machine_id(), Some(0));
        assert!(cluster.unit("mysql/9").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_add_unit_requires_alive_machine() {
        let cluster = cluster();
        let mut m = cluster.add_machine().await.unwrap();
        m.kill().await.unwrap();

        let err = cluster.add_unit("mysql", Some(0), None).await.unwrap_err();
        assert!(matches!(err, ConvoyError::NotAlive { .. }));
        let err = cluster.add_unit("mysql", Some(5), None).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "cannot add unit of mysql: machine 5 not found");
    }

    #[tokio::test]
    async fn test_subordinates() {
        let cluster = cluster();
        let m = cluster.add_machine().await.unwrap();
        let wp = cluster.add_unit("wordpress", Some(m.id()), None).await.unwrap();
        let log0 = cluster.add_unit("logging", None, Some(wp.name())).await.unwrap();
        assert_eq!(log0.principal(), Some("wordpress/0"));
        assert!(!log0.is_principal());

        let err = cluster
            .add_unit("logging", Some(m.id()), Some(wp.name()))
            .await
            .unwrap_err();
        assert!(err.is_fatal());

        let err = cluster.add_unit("logging", None, Some("nope/0")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_machine_units_lists_alive_subordinates() {
        let cluster = cluster();
        let m0 = cluster.add_machine().await.unwrap();
        let m1 = cluster.add_machine().await.unwrap();
        let wp = cluster.add_unit("wordpress", Some(0), None).await.unwrap();
        cluster.add_unit("mysql", Some(1), None).await.unwrap();
        cluster.add_unit("logging", None, Some(wp.name())).await.unwrap();
        let mut dead_sub = cluster.add_unit("monitor", None, Some(wp.name())).await.unwrap();
        dead_sub.kill().await.unwrap();

        assert_eq!(names(&m0.units().await.unwrap()), ["wordpress/0", "logging/0"]);
        assert_eq!(names(&m1.units().await.unwrap()), ["mysql/0"]);
    }

    #[tokio::test]
    async fn test_unit_lifecycle() {
        let cluster = cluster();
        let mut unit = cluster.add_unit("mysql", None, None).await.unwrap();
        unit.kill().await.unwrap();
        assert_eq!(unit.life(), Life::Dying);
        assert!(cluster.remove_unit("mysql/0").await.is_err());

        unit.die().await.unwrap();
        cluster.remove_unit("mysql/0").await.unwrap();
        let err = unit.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "cannot refresh unit mysql/0: unit mysql/0 not found");
    }

    #[tokio::test]
    async fn test_unit_presence_key() {
        let cluster = cluster();
        let unit = cluster.add_unit("mysql", None, None).await.unwrap();
        assert_eq!(unit.global_key(), "u#mysql/0");
        let _pinger = unit.set_agent_alive().await.unwrap();
        assert!(unit.agent_alive().await.unwrap());
    }
}
