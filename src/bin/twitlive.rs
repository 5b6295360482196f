use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use twitlive::{
    api::{
        twitter::{OAuthSigner, TrendClient, TwitterStreamFeed},
        Feed, ReplayConfig, ReplayFeed,
    },
    config::{AppConfig, ConfigManager},
    logging, report,
    session::{
        CancelHandle, CancelSignal, ExecutionMode, MultiSessionOrchestrator, OrchestratorConfig,
        TargetSelection, TopicTarget,
    },
    Classifier,
};

/// ライブツイートストリームの集計ツール
#[derive(Parser, Debug)]
#[command(name = "twitlive", version, about = "Live tweet stream aggregation")]
struct Cli {
    /// 設定ファイルのパス（省略時はXDG設定ディレクトリ）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 1トピックあたりの計測秒数
    #[arg(long, global = true)]
    window: Option<u64>,

    /// 受信したツイートを逐次表示
    #[arg(long, global = true)]
    live: bool,

    /// 結果をJSONで書き出す
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 1つの検索クエリをライブ計測
    Search { query: String },

    /// 地域のトレンド上位を順に計測
    Trends {
        /// Yahoo! WOEID（1 = 全世界）
        #[arg(long, default_value_t = 1)]
        woeid: u64,

        /// 計測するトレンド数（数値または all）
        #[arg(long, default_value = "10")]
        count: TargetSelection,

        /// 同時に実行するセッション数の上限
        #[arg(long)]
        concurrent: Option<usize>,
    },

    /// NDJSONキャプチャを再生して計測（認証不要）
    Replay {
        file: PathBuf,

        #[arg(required = true)]
        queries: Vec<String>,

        /// イベント間隔（ミリ秒）
        #[arg(long, default_value_t = 50)]
        interval_ms: u64,

        /// ファイル終端で上流切断として扱う
        #[arg(long)]
        disconnect_at_end: bool,

        #[arg(long)]
        concurrent: Option<usize>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    // ログ初期化には設定が必要なため、読み込み中は一時的なサブスクライバーで出力する
    let mut config = tracing::subscriber::with_default(logging::bootstrap_subscriber(), || {
        manager.load_or_default()
    });
    if let Some(window) = cli.window {
        config.session.window_secs = window;
    }
    if cli.live {
        config.session.live_echo = true;
    }
    if config.log.enable_file_logging && config.log.log_dir.is_none() {
        config.log.log_dir = Some(ConfigManager::default_log_dir()?);
    }

    // tokio-consoleの初期化（プロファイリング用）
    #[cfg(feature = "debug-tokio")]
    console_subscriber::init();

    #[cfg(not(feature = "debug-tokio"))]
    let _log_guard = logging::init_logging(&config.log)?;

    tracing::info!("🎬 Starting twitlive");
    tracing::info!("⚙️ Config file: {}", manager.config_path().display());

    let (cancel, signal) = CancelHandle::new();

    // Ctrl+Cシグナルハンドラー（2回目で強制終了）
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            tracing::warn!("🛑 強制終了します");
            std::process::exit(130);
        }
        tracing::info!("🛑 終了シグナルを受信しました。実行中のセッションを締めくくります");
        cancel.cancel();
    })
    .context("Failed to set signal handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let result = runtime.block_on(run(cli, config, signal));

    tracing::info!("👋 twitlive shutting down");
    result
}

fn twitter_signer(config: &AppConfig) -> Result<OAuthSigner> {
    config.credentials.validate().context(
        "Twitter credentials are incomplete (set them in the config file or TWITLIVE_* variables)",
    )?;
    Ok(OAuthSigner::new(config.credentials.clone()))
}

fn execution_mode(config: &AppConfig, concurrent: Option<usize>) -> ExecutionMode {
    match concurrent {
        Some(max_sessions) => ExecutionMode::Concurrent {
            max_sessions: max_sessions.max(1),
        },
        None => config.session.execution_mode(),
    }
}

async fn run(cli: Cli, config: AppConfig, cancel: CancelSignal) -> Result<()> {
    let mut orchestrator_config = OrchestratorConfig {
        window: config.session.window_config(),
        mode: config.session.execution_mode(),
        selection: TargetSelection::All,
    };

    let (feed, targets, label, heading): (Arc<dyn Feed>, Vec<TopicTarget>, &str, String) =
        match cli.command {
            Command::Search { query } => {
                let signer = twitter_signer(&config)?;
                let feed = TwitterStreamFeed::new(signer, config.twitter.clone())?;
                // 検索は常に1セッション
                orchestrator_config.mode = ExecutionMode::Sequential;
                let heading = format!("Summary for search [ {} ]", query);
                (Arc::new(feed), vec![TopicTarget::new(query)], "Search", heading)
            }
            Command::Trends {
                woeid,
                count,
                concurrent,
            } => {
                let signer = twitter_signer(&config)?;
                let trends = TrendClient::new(signer.clone(), config.twitter.clone())?
                    .fetch_trends(woeid)
                    .await
                    .with_context(|| format!("Failed to fetch trends for WOEID {}", woeid))?;
                let feed = TwitterStreamFeed::new(signer, config.twitter.clone())?;

                orchestrator_config.selection = count;
                orchestrator_config.mode = execution_mode(&config, concurrent);
                let heading = format!(
                    "Summary of top {} trends from [ WOEID {} ]",
                    count.apply(&trends).len(),
                    woeid
                );
                (Arc::new(feed), trends, "Trend", heading)
            }
            Command::Replay {
                file,
                queries,
                interval_ms,
                disconnect_at_end,
                concurrent,
            } => {
                let feed = ReplayFeed::new(
                    &file,
                    ReplayConfig {
                        interval: Duration::from_millis(interval_ms),
                        disconnect_at_end,
                        ..ReplayConfig::default()
                    },
                );
                orchestrator_config.mode = execution_mode(&config, concurrent);
                let heading = format!("Summary of replay [ {} ]", file.display());
                let targets = queries.into_iter().map(TopicTarget::new).collect();
                (Arc::new(feed), targets, "Query", heading)
            }
        };

    let orchestrator =
        MultiSessionOrchestrator::new(feed, Classifier::default(), orchestrator_config);
    let combined = orchestrator.run(&targets, cancel).await;

    println!();
    println!("{}", heading);
    if combined.reports.len() == 1 {
        print!("{}", report::render_session_table(label, &combined.reports));
    } else {
        print!("{}", report::render_summary_table(label, &combined));
        println!();
        print!("{}", report::render_volume_lines(&combined.summary));
    }

    for target in &combined.reports {
        if let twitlive::TargetOutcome::Failed { error } = &target.outcome {
            println!("  ✗ {}: {}", target.target.name, error);
        }
    }

    if let Some(path) = &cli.json {
        report::write_json(path, &combined)
            .with_context(|| format!("Failed to write JSON report: {}", path.display()))?;
    }

    let summary = &combined.summary;
    if summary.sessions > 0 && summary.failed == summary.sessions {
        anyhow::bail!("All {} targets failed", summary.sessions);
    }

    Ok(())
}
