//! ログ初期化とログ用ユーティリティ

use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;

/// ログシステムの初期化
///
/// `RUST_LOG` が設定されていればそちらを優先する。ファイル出力が有効なら
/// 日次ローテーションのファイルにも書き出し、そのワーカーガードを返す
/// （ガードを破棄するとファイル出力が止まる）。
pub fn init_logging(config: &LogConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .or_else(|_| EnvFilter::try_new("info"))?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let (file_layer, guard) = match (&config.enable_file_logging, &config.log_dir) {
        (true, Some(dir)) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "twitlive.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    if let Some(dir) = config.log_dir.as_ref().filter(|_| guard.is_some()) {
        info!("📝 File logging enabled: {}", dir.display());
    }

    Ok(guard)
}

/// 設定読み込み前に使う一時的なコンソールサブスクライバー
///
/// `tracing::subscriber::with_default` と組み合わせ、`init_logging` の前に
/// 出たログを失わないようにする。
pub fn bootstrap_subscriber() -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .finish()
}

/// 状態機械の遷移をログ。種類が変わったときは info、同じなら debug
pub fn log_state_change<S: std::fmt::Debug>(component: &str, old_state: &S, new_state: &S) {
    let old = format!("{:?}", old_state);
    let new = format!("{:?}", new_state);
    if old != new {
        info!(
            old_state = %old,
            new_state = %new,
            "🔄 [{}] State changed",
            component
        );
    } else {
        debug!(state = %new, "📊 [{}] State checked", component);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_state_change_accepts_any_debug_type() {
        // サブスクライバー未設定でもパニックしない
        log_state_change("TEST", &1u8, &2u8);
        log_state_change("TEST", &"same", &"same");
    }

    #[test]
    fn test_bootstrap_subscriber_is_scoped() {
        let loaded = tracing::subscriber::with_default(bootstrap_subscriber(), || {
            info!("⚙️ bootstrap");
            tracing::enabled!(tracing::Level::INFO)
        });
        // スコープ外ではグローバル設定に影響しない
        assert!(loaded || std::env::var("RUST_LOG").is_ok());
        log_state_change("TEST", &"after", &"bootstrap");
    }
}
