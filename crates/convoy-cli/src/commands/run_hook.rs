//! Running a single hook from the command line

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use convoy_core::{ConvoyConfig, ConvoyResult};
use convoy_hook::{HookExecutor, HookRunner, Info, Kind, StateFile, StaticContext, Synchronizer};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Everything `run-hook` was asked to do
#[derive(Debug, Clone)]
pub struct RunHookRequest {
    pub unit: String,
    pub kind: String,
    pub charm_dir: PathBuf,
    pub relation: Option<String>,
    pub relation_id: Option<i64>,
    pub remote_unit: Option<String>,
    pub change_version: Option<i64>,
    pub members: Vec<String>,
    pub env: Vec<String>,
    pub agent_socket: String,
    pub state_file: PathBuf,
}

/// Standalone runs keep no relation bookkeeping beyond the state file
struct StandaloneSync;

#[async_trait]
impl Synchronizer for StandaloneSync {
    async fn synchronize(&self, info: &Info) -> ConvoyResult<()> {
        info!("No relation state to synchronise after {}", info.kind);
        Ok(())
    }
}

/// Split `KEY=VALUE` arguments
pub fn parse_env(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(anyhow!("invalid environment entry {:?}, expected KEY=VALUE", pair)),
        })
        .collect()
}

/// Build hook info from the request; validation happens in the runner
pub fn build_info(request: &RunHookRequest) -> Result<Info> {
    let kind: Kind = request.kind.parse().map_err(|e: String| anyhow!(e))?;
    if kind.is_relation() && request.relation.is_none() {
        bail!("{} hooks need --relation", kind);
    }
    Ok(Info {
        kind,
        relation_id: request.relation_id,
        remote_unit: request.remote_unit.clone(),
        change_version: request.change_version,
        members: request.members.iter().map(|m| (m.clone(), None)).collect(),
    })
}

pub async fn run(config: &ConvoyConfig, request: RunHookRequest, cancel: CancellationToken) -> Result<()> {
    let info = build_info(&request)?;
    let ctx = StaticContext::new(parse_env(&request.env)?);

    ensure_parent(&request.state_file).await?;
    let runner = HookRunner::new(
        request.unit.as_str(),
        request.charm_dir.as_path(),
        StateFile::new(&request.state_file),
        HookExecutor::from_config(&config.hooks),
    )
    .with_agent_socket(request.agent_socket.as_str());

    runner
        .run(&info, request.relation.as_deref(), &ctx, &StandaloneSync, &cancel)
        .await?;
    println!("{}: {} committed", request.unit, info.kind.hook_name(request.relation.as_deref())?);
    Ok(())
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: &str) -> RunHookRequest {
        RunHookRequest {
            unit: "wordpress/0".to_string(),
            kind: kind.to_string(),
            charm_dir: PathBuf::from("/charm"),
            relation: None,
            relation_id: None,
            remote_unit: None,
            change_version: None,
            members: vec![],
            env: vec![],
            agent_socket: String::new(),
            state_file: PathBuf::from("/state/hook"),
        }
    }

    #[test]
    fn test_parse_env() {
        let vars = parse_env(&["A=1".to_string(), "B=x=y".to_string()]).unwrap();
        assert_eq!(vars, [("A".to_string(), "1".to_string()), ("B".to_string(), "x=y".to_string())]);
        assert!(parse_env(&["novalue".to_string()]).is_err());
        assert!(parse_env(&["=1".to_string()]).is_err());
    }

    #[test]
    fn test_build_info() {
        let info = build_info(&request("config-changed")).unwrap();
        assert_eq!(info, Info::unit(Kind::ConfigChanged));

        assert!(build_info(&request("teardown")).is_err());
        assert!(build_info(&request("relation-joined")).is_err());

        let mut joined = request("relation-joined");
        joined.relation = Some("db".to_string());
        joined.relation_id = Some(2);
        joined.remote_unit = Some("mysql/0".to_string());
        joined.change_version = Some(0);
        joined.members = vec!["mysql/0".to_string()];
        let info = build_info(&joined).unwrap();
        assert!(info.validate().is_ok());
        assert!(info.members.contains_key("mysql/0"));
    }
}
