//! Forgeflow action entrypoint
//!
//! GitHub Actions のステップとして 2 フェーズで動く:
//! main フェーズがビルド本体、post フェーズが一時ディレクトリの回収。
//! フェーズ判定は state (`isPost`) で行い、同じバイナリが 2 回起動される。

use clap::Parser;
use forgeflow_build::{BuildArtifacts, BuildError, BuildRequest, auth, exec, plan_build};
use forgeflow_core::{GithubContext, TempSpace, actions};

#[derive(Parser)]
#[command(name = "forge-action")]
#[command(version, about = "Depot でイメージをビルドする GitHub Actions ステップ", long_about = None)]
struct Cli {
    /// post フェーズ (一時ディレクトリの回収) を明示的に実行
    #[arg(long)]
    post: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // 初回起動で isPost を保存しておくと、ランナーが再起動する 2 回目
    // (post フェーズ) で state から区別できる
    let is_post = cli.post || actions::get_state("isPost").is_some();
    if !is_post && let Err(err) = actions::save_state("isPost", "true") {
        tracing::warn!("failed to save phase state: {}", err);
    }

    let result = if is_post { post().await } else { run().await };

    if let Err(err) = result {
        actions::error(&err.to_string());
        std::process::exit(1);
    }
}

/// main フェーズ: ビルドして結果を出力する
async fn run() -> anyhow::Result<()> {
    if !exec::is_installed().await {
        return Err(BuildError::BuilderNotInstalled.into());
    }

    actions::start_group("Depot version");
    exec::version().await?;
    actions::end_group();

    let ctx = GithubContext::from_env()?;
    let temp = TempSpace::acquire()?;
    let req = BuildRequest::from_action(&ctx)?;

    let plan = plan_build(&req, &ctx, &temp)?;
    let credential = auth::resolve(&req, &ctx).await;
    exec::build(&req, &plan, credential.as_ref()).await?;

    publish(&BuildArtifacts::collect(&temp))?;
    Ok(())
}

/// ビルド結果をステップ出力として公開する (存在するものだけ)
fn publish(artifacts: &BuildArtifacts) -> anyhow::Result<()> {
    if let Some(image_id) = &artifacts.image_id {
        actions::start_group("ImageID");
        actions::info(image_id);
        actions::set_output("imageid", image_id)?;
        actions::end_group();
    }

    if let Some(digest) = &artifacts.digest {
        actions::start_group("Digest");
        actions::info(digest);
        actions::set_output("digest", digest)?;
        actions::end_group();
    }

    if let Some(metadata) = &artifacts.metadata {
        actions::start_group("Metadata");
        actions::info(metadata);
        actions::set_output("metadata", metadata)?;
        actions::end_group();
    }

    if let Some(build_id) = &artifacts.build_id {
        actions::set_output("build-id", build_id)?;
    }
    if let Some(project_id) = &artifacts.project_id {
        actions::set_output("project-id", project_id)?;
    }

    Ok(())
}

/// post フェーズ: main が作った一時ディレクトリを削除する
async fn post() -> anyhow::Result<()> {
    let Some(temp) = TempSpace::from_state() else {
        return Ok(());
    };

    actions::start_group(&format!("Removing temp folder {}", temp.path().display()));
    temp.remove()?;
    actions::end_group();
    Ok(())
}
