//! Machines

use super::sequence::next_value;
use super::unit::{UNITS_COLLECTION, UnitDoc};
use super::{AgentPresence, Life, TXN_ATTEMPTS, Unit, ensure_life};
use crate::context::Cluster;
use crate::error::{ConvoyError, ConvoyResult, OptionExt, ResultExt};
use crate::store::{
    Assert, Condition, Op, StoreError, Update, fields, from_document, to_document,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

pub(crate) const MACHINES_COLLECTION: &str = "machines";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct MachineDoc {
    pub id: u64,
    pub life: Life,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

/// Cached handle to a machine document
///
/// Reads come from the snapshot taken when the handle was loaded; call
/// [`Machine::refresh`] to observe changes made by other agents.
#[derive(Clone)]
pub struct Machine {
    cluster: Cluster,
    doc: MachineDoc,
}

impl Machine {
    pub fn id(&self) -> u64 {
        self.doc.id
    }

    pub fn life(&self) -> Life {
        self.doc.life
    }

    /// Provider instance id, once the machine has been provisioned
    pub fn instance_id(&self) -> ConvoyResult<&str> {
        self.doc
            .instance_id
            .as_deref()
            .or_not_found(format!("instance id for {}", self))
    }

    /// Record the provider instance id; the machine must still be alive
    pub async fn set_instance_id(&mut self, instance_id: &str) -> ConvoyResult<()> {
        let op = Op::new(MACHINES_COLLECTION, self.doc.id.to_string())
            .assert(Assert::Matches(vec![Condition::eq("life", Life::Alive.as_str())]))
            .update(Update::Set(fields([("instance_id", instance_id)])));

        match self.cluster.store().run(vec![op]).await {
            Ok(()) => {
                self.doc.instance_id = Some(instance_id.to_string());
                info!("{} provisioned as {}", self, instance_id);
                Ok(())
            }
            Err(StoreError::Aborted { .. }) => {
                let context = format!("cannot set instance id of {}", self);
                match self.cluster.store().find(MACHINES_COLLECTION, &self.doc.id.to_string()).await? {
                    None => Err(ConvoyError::not_found(self.to_string()).with_context(context)),
                    Some(_) => Err(ConvoyError::not_alive(self.to_string()).with_context(context)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move the machine to `Dying`; a no-op if it is already dying or dead
    pub async fn kill(&mut self) -> ConvoyResult<()> {
        self.advance(Life::Dying).await
    }

    /// Move the machine to `Dead`; a no-op if it is already dead
    pub async fn die(&mut self) -> ConvoyResult<()> {
        self.advance(Life::Dead).await
    }

    async fn advance(&mut self, target: Life) -> ConvoyResult<()> {
        if self.doc.life >= target {
            return Ok(());
        }
        let life = ensure_life(
            self.cluster.store().as_ref(),
            MACHINES_COLLECTION,
            &self.doc.id.to_string(),
            &self.to_string(),
            target,
        )
        .await?;
        self.doc.life = self.doc.life.max(life);
        Ok(())
    }

    /// Reload the snapshot from the store
    pub async fn refresh(&mut self) -> ConvoyResult<()> {
        let doc = self
            .cluster
            .store()
            .find(MACHINES_COLLECTION, &self.doc.id.to_string())
            .await?
            .or_not_found(self.to_string())
            .with_context(|| format!("cannot refresh {}", self))?;
        self.doc = from_document(doc)?;
        Ok(())
    }

    /// Units assigned to this machine, each followed by its alive subordinates
    pub async fn units(&self) -> ConvoyResult<Vec<Unit>> {
        let store = self.cluster.store();
        let principals = store
            .find_matching(UNITS_COLLECTION, &[Condition::eq("machine", self.doc.id)])
            .await?;

        let mut units = Vec::new();
        for (_, doc) in principals {
            let principal: UnitDoc = from_document(doc)?;
            let subordinates = store
                .find_matching(
                    UNITS_COLLECTION,
                    &[
                        Condition::eq("principal", principal.name.as_str()),
                        Condition::eq("life", Life::Alive.as_str()),
                    ],
                )
                .await?;
            units.push(Unit::from_doc(self.cluster.clone(), principal));
            for (_, doc) in subordinates {
                units.push(Unit::from_doc(self.cluster.clone(), from_document(doc)?));
            }
        }
        Ok(units)
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine {}", self.doc.id)
    }
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine").field("doc", &self.doc).finish()
    }
}

impl AgentPresence for Machine {
    fn global_key(&self) -> String {
        format!("m#{}", self.doc.id)
    }

    fn cluster(&self) -> &Cluster {
        &self.cluster
    }
}

impl Cluster {
    /// Create a new alive machine with the next free id
    pub async fn add_machine(&self) -> ConvoyResult<Machine> {
        for _ in 0..TXN_ATTEMPTS {
            let (id, claim) = next_value(self.store().as_ref(), "machine").await?;
            let doc = MachineDoc {
                id,
                life: Life::Alive,
                instance_id: None,
            };
            let insert = Op::insert(MACHINES_COLLECTION, id.to_string(), to_document(&doc)?);
            match self.store().run(vec![claim, insert]).await {
                Ok(()) => {
                    info!("Added machine {}", id);
                    return Ok(Machine {
                        cluster: self.clone(),
                        doc,
                    });
                }
                Err(StoreError::Aborted { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ConvoyError::aborted(MACHINES_COLLECTION, "?").with_context("cannot add machine"))
    }

    /// Load machine `id`
    pub async fn machine(&self, id: u64) -> ConvoyResult<Machine> {
        let doc = self
            .store()
            .find(MACHINES_COLLECTION, &id.to_string())
            .await?
            .or_not_found(format!("machine {}", id))?;
        Ok(Machine {
            cluster: self.clone(),
            doc: from_document(doc)?,
        })
    }

    /// Delete a dead machine
    pub async fn remove_machine(&self, id: u64) -> ConvoyResult<()> {
        let key = id.to_string();
        let op = Op::new(MACHINES_COLLECTION, key.clone())
            .assert(Assert::Matches(vec![Condition::eq("life", Life::Dead.as_str())]))
            .update(Update::Remove);
        match self.store().run(vec![op]).await {
            Ok(()) => {
                info!("Removed machine {}", id);
                Ok(())
            }
            Err(StoreError::Aborted { .. }) => {
                match self.store().find(MACHINES_COLLECTION, &key).await? {
                    None => Err(ConvoyError::not_found(format!("machine {}", id))),
                    Some(_) => Err(ConvoyError::aborted(MACHINES_COLLECTION, key)
                        .with_context(format!("cannot remove machine {}: machine is not dead", id))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
