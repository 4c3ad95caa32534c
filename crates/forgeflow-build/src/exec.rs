//! ビルダー子プロセスの実行
//!
//! stdin は継承、stdout/stderr はパイプして親の stdout にそのまま流し、
//! SIGINT/SIGTERM を子に転送します。非ゼロ終了かつ stderr が空でない場合
//! だけをビルド失敗として扱い、最後の stderr 行をメッセージにします。
//! 失敗時、ポリシーが許せば `docker buildx build` へフォールバックします。

use crate::args::BuildPlan;
use crate::auth::Credential;
use crate::error::{BuildError, BuildResult};
use crate::inputs::BuildRequest;
use forgeflow_core::actions;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::signal::unix::{SignalKind, signal};

const BUILDER: &str = "depot";
const FALLBACK_BUILDER: &str = "docker";

/// depot CLI がインストールされているか (引数なし実行で exit 0)
pub async fn is_installed() -> bool {
    Command::new(BUILDER)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// `depot version` を出力ごと中継する
pub async fn version() -> BuildResult<()> {
    let status = Command::new(BUILDER).arg("version").status().await?;
    if !status.success() {
        return Err(BuildError::CommandFailed("depot version".to_string()));
    }
    Ok(())
}

/// ビルドを実行し、必要ならフォールバックする
pub async fn build(
    req: &BuildRequest,
    plan: &BuildPlan,
    credential: Option<&Credential>,
) -> BuildResult<()> {
    let envs: Vec<(String, String)> = credential
        .map(|c| vec![("DEPOT_TOKEN".to_string(), c.token.clone())])
        .unwrap_or_default();

    match run_build(BUILDER, &plan.primary(), &envs).await {
        Ok(()) => Ok(()),
        Err(err) => {
            if fallback_eligible(req, &err) {
                actions::warning(&format!("falling back to buildx: {}", err));
                run_build(FALLBACK_BUILDER, &plan.fallback(), &[]).await
            } else {
                Err(err)
            }
        }
    }
}

/// フォールバックしてよい失敗か
///
/// lint 失敗は呼び出し側が明示的に課したポリシーなので、フォールバックで
/// 黙ってスキップしてはいけない。
fn fallback_eligible(req: &BuildRequest, err: &BuildError) -> bool {
    if !req.buildx_fallback {
        return false;
    }
    let lint_failed = req.lint
        && matches!(err, BuildError::BuildFailed(message) if message.contains("linting failed"));
    !lint_failed
}

/// 子プロセスを実行して出力を中継する
pub async fn run_build(
    program: &str,
    args: &[String],
    envs: &[(String, String)],
) -> BuildResult<()> {
    let resolved = resolve_program(program).await?;
    actions::info(&format!("[command]{} {}", resolved, args.join(" ")));

    let mut cmd = Command::new(&resolved);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn()?;
    let pid = child.id().map(|id| Pid::from_raw(id as i32));

    // drop で必ず解除されるシグナル転送フック
    let _forwarder = SignalForwarder::install(pid)?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("child stdout not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("child stderr not captured"))?;

    let stdout_task = tokio::spawn(relay(stdout, false));
    let stderr_task = tokio::spawn(relay(stderr, true));

    let status = child.wait().await?;
    let _ = stdout_task.await;
    let stderr_lines = stderr_task.await.unwrap_or_default();

    if !status.success()
        && let Some(last) = stderr_lines.iter().rev().find(|line| !line.trim().is_empty())
    {
        return Err(BuildError::BuildFailed(last.trim().to_string()));
    }
    Ok(())
}

/// PATH からプログラムを解決する
async fn resolve_program(program: &str) -> BuildResult<String> {
    let output = Command::new("which").arg(program).output().await?;
    if !output.status.success() {
        return Err(BuildError::CommandNotFound(program.to_string()));
    }
    let resolved = String::from_utf8_lossy(&output.stdout).trim().to_string();
    tracing::debug!("resolved {} to {}", program, resolved);
    Ok(resolved)
}

/// 出力ストリームを 1 行ずつ親の stdout に流す (stderr は収集もする)
async fn relay<R: AsyncRead + Unpin + Send>(reader: R, capture: bool) -> Vec<String> {
    let mut lines = BufReader::new(reader).lines();
    let mut captured = Vec::new();
    while let Ok(Some(line)) = lines.next_line().await {
        println!("{}", line);
        if capture {
            captured.push(line);
        }
    }
    captured
}

/// SIGINT/SIGTERM を子プロセスに転送するスコープ付きフック
///
/// 転送後も親は子自身の終了を待つ (子のクリーンアップを壊さない)。
/// drop でタスクが abort され、どの経路でもフックが残らない。
struct SignalForwarder {
    handle: tokio::task::JoinHandle<()>,
}

impl SignalForwarder {
    fn install(pid: Option<Pid>) -> BuildResult<Self> {
        let mut sigint = signal(SignalKind::interrupt()).map_err(BuildError::Io)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(BuildError::Io)?;

        let handle = tokio::spawn(async move {
            loop {
                let forwarded = tokio::select! {
                    _ = sigint.recv() => Signal::SIGINT,
                    _ = sigterm.recv() => Signal::SIGTERM,
                };
                if let Some(pid) = pid {
                    let _ = kill(pid, forwarded);
                }
            }
        });

        Ok(Self { handle })
    }
}

impl Drop for SignalForwarder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
