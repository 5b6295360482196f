//! プロセス内チャネルフィード
//!
//! トピックごとのスクリプト再生、接続拒否、手動プロデューサーをサポートする。
//! 組み込み用途とテスト用のフィード実装。

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::feed::{ConnectError, Feed, FeedConnection, FeedSink, StopSignal, TopicFilter};
use super::tweet::Tweet;

/// スクリプトの1ステップ
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Event(Tweet),
    Stall(String),
    /// 上流切断を通知してストリームを終了する
    Disconnect(String),
    Pause(Duration),
}

/// 接続拒否の種類
#[derive(Debug, Clone)]
pub enum Refusal {
    Auth(String),
    Network(String),
    RateLimited { retry_after_seconds: u64 },
}

impl Refusal {
    fn to_error(&self) -> ConnectError {
        match self {
            Refusal::Auth(message) => ConnectError::Auth(message.clone()),
            Refusal::Network(message) => ConnectError::Network(message.clone()),
            Refusal::RateLimited {
                retry_after_seconds,
            } => ConnectError::RateLimited {
                retry_after_seconds: *retry_after_seconds,
            },
        }
    }
}

#[derive(Debug, Clone)]
enum TopicBehavior {
    Script(Vec<ScriptStep>),
    Refuse(Refusal),
}

/// 手動でイベントを流すためのプロデューサー
///
/// 停止要求後にこの値を破棄するとドレイン完了になる。
#[derive(Debug)]
pub struct ChannelFeedProducer {
    topic: String,
    sink: FeedSink,
    stop: StopSignal,
    _active: ActiveGuard,
}

impl ChannelFeedProducer {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn sink(&self) -> &FeedSink {
        &self.sink
    }

    pub async fn send(&self, tweet: Tweet) -> bool {
        self.sink.event(tweet).await
    }

    pub async fn stall(&self, message: &str) -> bool {
        self.sink.stall(message).await
    }

    pub async fn stopped(&mut self) {
        self.stop.stopped().await
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }
}

#[derive(Debug)]
struct ActiveGuard {
    active: Arc<AtomicUsize>,
}

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// プロセス内チャネルフィード
#[derive(Debug)]
pub struct ChannelFeed {
    name: String,
    behaviors: Mutex<HashMap<String, TopicBehavior>>,
    manual_tx: Option<mpsc::UnboundedSender<ChannelFeedProducer>>,
    active: Arc<AtomicUsize>,
    peak: AtomicUsize,
    connects: AtomicUsize,
}

impl ChannelFeed {
    /// スクリプト駆動のフィードを作成（未登録トピックは無イベントで接続維持）
    pub fn new() -> Self {
        Self {
            name: "channel".to_string(),
            behaviors: Mutex::new(HashMap::new()),
            manual_tx: None,
            active: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
        }
    }

    /// 未登録トピックの接続ごとにプロデューサーを受け取る手動モード
    pub fn manual() -> (Self, mpsc::UnboundedReceiver<ChannelFeedProducer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut feed = Self::new();
        feed.manual_tx = Some(tx);
        (feed, rx)
    }

    pub fn with_script(self, topic: impl Into<String>, steps: Vec<ScriptStep>) -> Self {
        self.behaviors
            .lock()
            .insert(topic.into(), TopicBehavior::Script(steps));
        self
    }

    pub fn with_events(self, topic: impl Into<String>, tweets: Vec<Tweet>) -> Self {
        let steps = tweets.into_iter().map(ScriptStep::Event).collect();
        self.with_script(topic, steps)
    }

    pub fn with_refusal(self, topic: impl Into<String>, refusal: Refusal) -> Self {
        self.behaviors
            .lock()
            .insert(topic.into(), TopicBehavior::Refuse(refusal));
        self
    }

    /// 現在接続中の数
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// 同時接続数の最大値
    pub fn peak_connections(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// 成功・失敗を含む接続試行回数
    pub fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Default for ChannelFeed {
    fn default() -> Self {
        Self::new()
    }
}

async fn play_script(
    steps: Vec<ScriptStep>,
    sink: FeedSink,
    mut stop: StopSignal,
    _active: ActiveGuard,
) {
    for step in steps {
        if stop.is_stopped() {
            return;
        }
        match step {
            ScriptStep::Event(tweet) => {
                if !sink.event(tweet).await {
                    return;
                }
            }
            ScriptStep::Stall(message) => {
                if !sink.stall(message).await {
                    return;
                }
            }
            ScriptStep::Disconnect(reason) => {
                sink.remote_disconnect(reason).await;
                return;
            }
            ScriptStep::Pause(duration) => {
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {}
                    _ = stop.stopped() => return,
                }
            }
        }
    }

    // スクリプト終了後は停止要求まで接続を維持
    stop.stopped().await;
}

#[async_trait]
impl Feed for ChannelFeed {
    async fn connect(
        &self,
        filter: &TopicFilter,
        sink: FeedSink,
    ) -> Result<FeedConnection, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behaviors.lock().get(&filter.track).cloned();

        if let Some(TopicBehavior::Refuse(refusal)) = &behavior {
            tracing::debug!("🚫 [CHANNEL_FEED] Refusing connect for {}", filter);
            return Err(refusal.to_error());
        }

        let (connection, stop) = FeedConnection::new(format!("{}:{}", self.name, filter.track));
        let guard = ActiveGuard::new(Arc::clone(&self.active), &self.peak);

        match (behavior, &self.manual_tx) {
            (Some(TopicBehavior::Script(steps)), _) => {
                tokio::spawn(play_script(steps, sink, stop, guard));
            }
            (_, Some(manual_tx)) => {
                let producer = ChannelFeedProducer {
                    topic: filter.track.clone(),
                    sink,
                    stop,
                    _active: guard,
                };
                manual_tx
                    .send(producer)
                    .map_err(|_| ConnectError::network("manual producer receiver dropped"))?;
            }
            _ => {
                tokio::spawn(play_script(Vec::new(), sink, stop, guard));
            }
        }

        tracing::debug!("🔗 [CHANNEL_FEED] Connected {}", filter);
        Ok(connection)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
