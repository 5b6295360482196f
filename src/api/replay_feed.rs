//! NDJSONキャプチャの再生フィード
//!
//! 記録済みのツイートファイルをライブストリームとして再生する。

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::feed::{ConnectError, Feed, FeedConnection, FeedSink, StopSignal, TopicFilter};
use super::tweet::Tweet;
use crate::io::ndjson::{read_tweets, NdjsonError};

/// 再生設定
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// イベント間隔
    pub interval: Duration,
    /// ファイル終端で上流切断として通知する（falseなら停止要求まで接続維持）
    pub disconnect_at_end: bool,
    /// 受信時刻を再生時刻で上書きする
    pub restamp: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            disconnect_at_end: false,
            restamp: true,
        }
    }
}

/// NDJSONリプレイフィード
#[derive(Debug)]
pub struct ReplayFeed {
    name: String,
    path: PathBuf,
    config: ReplayConfig,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>, config: ReplayConfig) -> Self {
        let path = path.into();
        Self {
            name: format!("replay:{}", path.display()),
            path,
            config,
        }
    }
}

impl From<NdjsonError> for ConnectError {
    fn from(error: NdjsonError) -> Self {
        match error {
            NdjsonError::Io(e) => ConnectError::Io(e),
            other => ConnectError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                other.to_string(),
            )),
        }
    }
}

async fn replay(
    tweets: Arc<Vec<Tweet>>,
    filter: TopicFilter,
    config: ReplayConfig,
    sink: FeedSink,
    mut stop: StopSignal,
) {
    let mut delivered = 0usize;

    for tweet in tweets.iter().filter(|t| filter.matches(&t.text)) {
        if stop.is_stopped() {
            break;
        }

        let mut tweet = tweet.clone();
        if config.restamp {
            tweet.received_at = chrono::Utc::now();
        }
        if !sink.event(tweet).await {
            break;
        }
        delivered += 1;

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = stop.stopped() => break,
        }
    }

    tracing::debug!(
        "📼 [REPLAY] Finished replay for {} ({} events delivered)",
        filter,
        delivered
    );

    if stop.is_stopped() {
        return;
    }
    if config.disconnect_at_end {
        sink.remote_disconnect("replay exhausted").await;
    } else {
        stop.stopped().await;
    }
}

#[async_trait]
impl Feed for ReplayFeed {
    async fn connect(
        &self,
        filter: &TopicFilter,
        sink: FeedSink,
    ) -> Result<FeedConnection, ConnectError> {
        let path = self.path.clone();
        let parsed = tokio::task::spawn_blocking(move || read_tweets(&path))
            .await
            .map_err(|e| ConnectError::network(format!("replay loader failed: {}", e)))??;

        if !parsed.skipped_lines.is_empty() {
            tracing::warn!(
                "⚠️ [REPLAY] {} malformed lines skipped in {}",
                parsed.skipped_lines.len(),
                self.path.display()
            );
        }
        tracing::info!(
            "📼 [REPLAY] Loaded {} tweets from {} for {}",
            parsed.entries.len(),
            self.path.display(),
            filter
        );

        let (connection, stop) = FeedConnection::new(self.name.clone());
        tokio::spawn(replay(
            Arc::new(parsed.entries),
            filter.clone(),
            self.config.clone(),
            sink,
            stop,
        ));
        Ok(connection)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
