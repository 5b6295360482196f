//! フィード抽象化
//!
//! 上流のイベント配信層（HTTPストリーム、リプレイファイル、プロセス内チャネル）を
//! セッション側から隠すためのトレイトと、配信路・停止信号の型を定義する。
//!
//! 配信は `FeedSink` 経由の `mpsc` チャネルで行う。フィードは停止要求を受けたら
//! 保持しているすべての `FeedSink` を破棄しなければならない。全ての送信側が破棄されて
//! チャネルが閉じることが「切断完了（ドレイン完了）」の通知になる。

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::tweet::Tweet;

/// 接続エラー（Running到達前の失敗）
#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded. Retry after {retry_after_seconds} seconds")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Stream rejected with HTTP status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Feed source unavailable: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

impl From<reqwest::Error> for ConnectError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

/// フィードに渡すフィルタ条件
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
#[display("track={track}")]
pub struct TopicFilter {
    pub track: String,
}

impl TopicFilter {
    pub fn new(track: impl Into<String>) -> Self {
        Self {
            track: track.into(),
        }
    }

    /// 大文字小文字を区別せずに本文がトピックを含むか判定
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.track.to_lowercase())
    }
}

/// フィードからセッションへ届く信号
#[derive(Debug, Clone, PartialEq)]
pub enum FeedSignal {
    /// イベント1件
    Event(Tweet),
    /// 上流の停滞警告
    Stall { message: String },
    /// 上流からの切断
    RemoteDisconnect { reason: String },
}

/// イベント配信路（複数の配信タスクで共有可能）
#[derive(Debug, Clone)]
pub struct FeedSink {
    tx: mpsc::Sender<FeedSignal>,
}

impl FeedSink {
    /// 配信路と受信側を作成
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<FeedSignal>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// 信号を送信。セッションが受信を終えていれば `false`
    pub async fn send(&self, signal: FeedSignal) -> bool {
        self.tx.send(signal).await.is_ok()
    }

    pub async fn event(&self, tweet: Tweet) -> bool {
        self.send(FeedSignal::Event(tweet)).await
    }

    pub async fn stall(&self, message: impl Into<String>) -> bool {
        self.send(FeedSignal::Stall {
            message: message.into(),
        })
        .await
    }

    pub async fn remote_disconnect(&self, reason: impl Into<String>) -> bool {
        self.send(FeedSignal::RemoteDisconnect {
            reason: reason.into(),
        })
        .await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// フィード側が監視する停止信号
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// 停止要求（または接続ハンドルの破棄）まで待機
    pub async fn stopped(&mut self) {
        // 送信側が破棄された場合も停止とみなす
        let _ = self.rx.wait_for(|stop| *stop).await;
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

/// 接続済みフィードのハンドル
#[derive(Debug)]
pub struct FeedConnection {
    feed_name: String,
    stop_tx: watch::Sender<bool>,
}

impl FeedConnection {
    /// 接続ハンドルとフィード側の停止信号を作成
    pub fn new(feed_name: impl Into<String>) -> (Self, StopSignal) {
        let (stop_tx, rx) = watch::channel(false);
        (
            Self {
                feed_name: feed_name.into(),
                stop_tx,
            },
            StopSignal { rx },
        )
    }

    /// 切断要求を送る。完了はチャネルのクローズで通知される
    pub fn disconnect(&self) {
        if !*self.stop_tx.borrow() {
            tracing::debug!("🔌 [FEED] Disconnect requested for {}", self.feed_name);
        }
        self.stop_tx.send_replace(true);
    }

    pub fn is_disconnect_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn feed_name(&self) -> &str {
        &self.feed_name
    }
}

/// イベントフィードの抽象インタフェース
#[async_trait]
pub trait Feed: Send + Sync {
    /// フィルタ条件で接続し、配信を `sink` に流し始める
    ///
    /// ハンドシェイク完了まで待機する。失敗時は `sink` を破棄して `ConnectError` を返す。
    async fn connect(
        &self,
        filter: &TopicFilter,
        sink: FeedSink,
    ) -> Result<FeedConnection, ConnectError>;

    /// ログ用の名前
    fn name(&self) -> &str;
}
