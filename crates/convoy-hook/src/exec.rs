//! Running hook programs

use crate::error::{HookError, HookResult};
use async_trait::async_trait;
use convoy_core::config::HooksConfig;
use convoy_core::env::{EnvCase, merge_pairs};
use convoy_core::ConvoyResult;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The parts of a hook's environment the context cannot supply
#[derive(Debug, Clone, PartialEq)]
pub struct ExecInfo {
    pub context_id: String,
    pub agent_socket: String,
    pub charm_dir: PathBuf,
    pub remote_unit: Option<String>,
}

impl ExecInfo {
    /// Base environment of every hook process
    pub fn vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("APT_LISTCHANGES_FRONTEND".to_string(), "none".to_string()),
            ("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string()),
            ("PATH".to_string(), std::env::var("PATH").unwrap_or_default()),
            ("CHARM_DIR".to_string(), self.charm_dir.display().to_string()),
            ("CONVOY_CONTEXT_ID".to_string(), self.context_id.clone()),
            ("CONVOY_AGENT_SOCKET".to_string(), self.agent_socket.clone()),
        ];
        if let Some(remote) = &self.remote_unit {
            vars.push(("CONVOY_REMOTE_UNIT".to_string(), remote.clone()));
        }
        vars
    }
}

/// The hook context as seen by the executor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecContext: Send + Sync {
    /// Context-specific environment, applied over the base environment
    fn vars(&self) -> Vec<(String, String)>;

    /// Write back whatever the hook changed through the context
    async fn flush(&self) -> ConvoyResult<()>;
}

/// A context with fixed variables and nothing to flush
#[derive(Debug, Clone, Default)]
pub struct StaticContext {
    vars: Vec<(String, String)>,
}

impl StaticContext {
    pub fn new(vars: Vec<(String, String)>) -> Self {
        Self { vars }
    }
}

#[async_trait]
impl ExecContext for StaticContext {
    fn vars(&self) -> Vec<(String, String)> {
        self.vars.clone()
    }

    async fn flush(&self) -> ConvoyResult<()> {
        Ok(())
    }
}

/// Runs `<charm-dir>/hooks/<name>` programs
#[derive(Debug, Clone)]
pub struct HookExecutor {
    timeout: Duration,
}

impl HookExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &HooksConfig) -> Self {
        Self::new(config.timeout)
    }

    /// Run hook `hook_name` and flush `ctx` if it exits successfully
    ///
    /// A charm without the hook is not an error: nothing runs and nothing is
    /// flushed. The process is killed if it outlives the timeout or `cancel`
    /// fires.
    pub async fn exec(
        &self,
        hook_name: &str,
        info: &ExecInfo,
        ctx: &dyn ExecContext,
        cancel: &CancellationToken,
    ) -> HookResult<()> {
        let program = info.charm_dir.join("hooks").join(hook_name);
        match tokio::fs::metadata(&program).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Skipping hook {}: {} does not exist", hook_name, program.display());
                return Ok(());
            }
            Err(e) => return Err(HookError::io(&program, e)),
        }

        let env = merge_pairs(EnvCase::native(), info.vars().into_iter().chain(ctx.vars()));

        let mut cmd = Command::new(&program);
        cmd.current_dir(&info.charm_dir)
            .env_clear()
            .envs(&env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Running hook {}", hook_name);
        let child = cmd.spawn().map_err(|e| HookError::io(&program, e))?;

        // Dropping the pending output future drops the child, which kills it.
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Hook {} cancelled", hook_name);
                return Err(HookError::Cancelled { hook: hook_name.to_string() });
            }
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => return Err(HookError::io(&program, e)),
                Err(_) => {
                    warn!("Hook {} timed out after {:?}", hook_name, self.timeout);
                    return Err(HookError::Timeout {
                        hook: hook_name.to_string(),
                        after_ms: self.timeout.as_millis() as u64,
                    });
                }
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Hook {} output: {}", hook_name, stdout.trim());
        }
        if !output.status.success() {
            return Err(HookError::ExecutionFailed {
                hook: hook_name.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        ctx.flush().await.map_err(|source| HookError::FlushFailed {
            hook: hook_name.to_string(),
            source,
        })?;
        info!("Hook {} completed", hook_name);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use convoy_core::ConvoyError;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn charm_with_hook(name: &str, body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        let hooks = dir.path().join("hooks");
        std::fs::create_dir(&hooks).unwrap();
        let path = hooks.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    }

    fn exec_info(charm_dir: &Path) -> ExecInfo {
        ExecInfo {
            context_id: "wordpress/0-install-1".to_string(),
            agent_socket: "/var/run/convoy/agent.socket".to_string(),
            charm_dir: charm_dir.to_path_buf(),
            remote_unit: None,
        }
    }

    fn context(vars: Vec<(String, String)>, flushes: usize) -> MockExecContext {
        let mut ctx = MockExecContext::new();
        ctx.expect_vars().return_const(vars);
        ctx.expect_flush().times(flushes).returning(|| Ok(()));
        ctx
    }

    fn executor() -> HookExecutor {
        HookExecutor::new(Duration::from_secs(10))
    }

    #[test]
    fn test_base_vars() {
        let mut info = exec_info(Path::new("/charm"));
        let vars = info.vars();
        assert!(vars.contains(&("CHARM_DIR".to_string(), "/charm".to_string())));
        assert!(vars.contains(&("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())));
        assert!(!vars.iter().any(|(k, _)| k == "CONVOY_REMOTE_UNIT"));

        info.remote_unit = Some("mysql/0".to_string());
        assert_eq!(
            info.vars().last(),
            Some(&("CONVOY_REMOTE_UNIT".to_string(), "mysql/0".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_hook_is_noop() {
        let charm = TempDir::new().unwrap();
        let ctx = context(vec![], 0);
        executor()
            .exec("install", &exec_info(charm.path()), &ctx, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_success_runs_in_charm_dir_and_flushes_once() {
        let charm = charm_with_hook("config-changed", "pwd > pwd.out\nenv > env.out");
        let mut info = exec_info(charm.path());
        info.remote_unit = Some("mysql/1".to_string());
        let ctx = context(
            vec![
                ("CONVOY_UNIT_NAME".to_string(), "wordpress/0".to_string()),
                ("DEBIAN_FRONTEND".to_string(), "readline".to_string()),
            ],
            1,
        );

        executor()
            .exec("config-changed", &info, &ctx, &CancellationToken::new())
            .await
            .unwrap();

        let pwd = std::fs::read_to_string(charm.path().join("pwd.out")).unwrap();
        assert_eq!(
            Path::new(pwd.trim()).canonicalize().unwrap(),
            charm.path().canonicalize().unwrap()
        );
        let env = std::fs::read_to_string(charm.path().join("env.out")).unwrap();
        let lines: Vec<&str> = env.lines().collect();
        for expected in [
            "APT_LISTCHANGES_FRONTEND=none",
            "CONVOY_CONTEXT_ID=wordpress/0-install-1",
            "CONVOY_AGENT_SOCKET=/var/run/convoy/agent.socket",
            "CONVOY_REMOTE_UNIT=mysql/1",
            "CONVOY_UNIT_NAME=wordpress/0",
            "DEBIAN_FRONTEND=readline",
        ] {
            assert!(lines.contains(&expected), "missing {} in {:?}", expected, lines);
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_without_flush() {
        let charm = charm_with_hook("start", "echo nope >&2\nexit 3");
        let ctx = context(vec![], 0);
        let err = executor()
            .exec("start", &exec_info(charm.path()), &ctx, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            HookError::ExecutionFailed { hook, code, stderr } => {
                assert_eq!(hook, "start");
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flush_error_is_the_result() {
        let charm = charm_with_hook("install", "true");
        let mut ctx = MockExecContext::new();
        ctx.expect_vars().return_const(Vec::new());
        ctx.expect_flush()
            .times(1)
            .returning(|| Err(ConvoyError::store("settings write refused")));

        let err = executor()
            .exec("install", &exec_info(charm.path()), &ctx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::FlushFailed { .. }));
        assert!(err.to_string().contains("settings write refused"));
    }

    #[tokio::test]
    async fn test_timeout_kills_hook() {
        let charm = charm_with_hook("install", "sleep 5");
        let ctx = context(vec![], 0);
        let started = std::time::Instant::now();
        let err = HookExecutor::new(Duration::from_millis(100))
            .exec("install", &exec_info(charm.path()), &ctx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Timeout { after_ms: 100, .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_cancel_kills_hook() {
        let charm = charm_with_hook("install", "sleep 5");
        let ctx = context(vec![], 0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = executor()
            .exec("install", &exec_info(charm.path()), &ctx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Cancelled { .. }));
    }
}
