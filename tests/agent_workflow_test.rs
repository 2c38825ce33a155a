//! A unit agent's working loop over a shared store
//!
//! The agent comes alive, takes leadership of its service, checks it before
//! a leader-only hook, and writes relation settings back through the hook
//! context.

#![cfg(unix)]

use async_trait::async_trait;
use convoy::convoy_core::store::{Op, Update, fields};
use convoy::convoy_core::{
    AgentPresence, Checker, Life, ManualClock, MemoryStore, Store, Token,
};
use convoy::convoy_hook::{
    ExecContext, HookExecutor, HookRunner, Info, Kind, StateFile, Status, Synchronizer,
};
use convoy::{Cluster, ConvoyConfig, ConvoyError, ConvoyResult};
use parking_lot::Mutex;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Hook context that refuses to flush once leadership is gone
struct LeaderContext {
    store: Arc<dyn Store>,
    unit: String,
    token: Box<dyn Token>,
}

#[async_trait]
impl ExecContext for LeaderContext {
    fn vars(&self) -> Vec<(String, String)> {
        vec![("CONVOY_UNIT_NAME".to_string(), self.unit.clone())]
    }

    async fn flush(&self) -> ConvoyResult<()> {
        self.token.check().await?;
        self.store
            .run(vec![
                Op::new("settings", "wordpress").update(Update::Upsert(fields([("leader", self.unit.as_str())]))),
            ])
            .await?;
        Ok(())
    }
}

#[derive(Default)]
struct Membership {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl Synchronizer for Membership {
    async fn synchronize(&self, info: &Info) -> ConvoyResult<()> {
        self.seen.lock().extend(info.members.keys().cloned());
        Ok(())
    }
}

fn charm(dir: &TempDir) -> std::path::PathBuf {
    let charm = dir.path().join("charm");
    let hooks = charm.join("hooks");
    std::fs::create_dir_all(&hooks).unwrap();
    for name in ["db-relation-joined", "install"] {
        let path = hooks.join(name);
        std::fs::write(&path, "#!/bin/sh\necho \"$CONVOY_UNIT_NAME\" >> ran\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    charm
}

#[tokio::test]
async fn test_unit_agent_workflow() -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::default());
    let cluster = Cluster::new(store.clone(), clock.clone(), ConvoyConfig::default())?;

    let machine = cluster.add_machine().await?;
    let unit = cluster.add_unit("wordpress", Some(machine.id()), None).await?;
    let pinger = unit.set_agent_alive().await?;
    unit.wait_agent_alive(Duration::from_secs(1)).await?;

    cluster.claim_leadership("wordpress", unit.name()).await?;
    let token = cluster
        .leadership_checker()
        .leadership_check("wordpress", unit.name());
    token.check().await?;

    let dir = TempDir::new()?;
    let charm = charm(&dir);
    let runner = HookRunner::new(
        unit.name(),
        &charm,
        StateFile::new(dir.path().join("hook")),
        HookExecutor::new(Duration::from_secs(10)),
    );
    let membership = Membership::default();
    let ctx = LeaderContext {
        store: store.clone(),
        unit: unit.name().to_string(),
        token,
    };

    let info = Info::relation(Kind::RelationJoined, 0, "mysql/0", 0).with_members([("mysql/0", None)]);
    runner
        .run(&info, Some("db"), &ctx, &membership, &CancellationToken::new())
        .await?;
    assert_eq!(*membership.seen.lock(), ["mysql/0"]);
    let settings = store.find("settings", "wordpress").await?.ok_or("settings missing")?;
    assert_eq!(settings["leader"], "wordpress/0");

    // Another unit takes over once the lease lapses; the old leader's flush
    // now fails and the hook stays uncommitted.
    clock.advance(cluster.config().leadership.lease_duration);
    cluster.claim_leadership("wordpress", "wordpress/1").await?;
    let err = runner
        .run(
            &Info::relation(Kind::RelationJoined, 0, "mysql/1", 0),
            Some("db"),
            &ctx,
            &membership,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not leader"));
    assert_eq!(runner.state_file().read().await?.status, Status::Started);
    assert_eq!(std::fs::read_to_string(charm.join("ran"))?.lines().count(), 2);

    pinger.stop().await?;
    assert!(!unit.agent_alive().await?);

    let mut unit = cluster.unit("wordpress/0").await?;
    unit.die().await?;
    assert_eq!(unit.life(), Life::Dead);
    cluster.remove_unit(unit.name()).await?;
    assert!(matches!(
        cluster.unit("wordpress/0").await,
        Err(ConvoyError::NotFound { .. })
    ));
    Ok(())
}
