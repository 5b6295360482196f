//! ウィンドウコントローラー
//!
//! 1トピック分のライブ計測を `Idle → Connecting → Running → Stopping → Closed`
//! の状態機械として実行する。タイマー・キャンセル・フィード信号を1つの
//! `tokio::select!` で待ち、停止後はフィードのチャネルが閉じるまでドレインする。

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::cancel::CancelSignal;
use super::target::TopicTarget;
use super::SessionError;
use crate::analytics::{Snapshot, StreamAggregator};
use crate::api::feed::{Feed, FeedSignal, TopicFilter};
use crate::api::tweet::Tweet;
use crate::api::FeedSink;
use crate::logging::log_state_change;

/// 1ターゲットあたりの既定の計測時間（秒）
pub const DEFAULT_WINDOW_SECS: u64 = 30;

/// コントローラーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Idle,
    Connecting,
    Running,
    Stopping,
    Closed,
}

/// ウィンドウ設定
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// 計測時間
    pub duration: Duration,
    /// 切断要求後にチャネルのクローズを待つ上限
    pub drain_timeout: Duration,
    /// フィードとの間のチャネル容量
    pub channel_capacity: usize,
    /// 受信したツイートを info ログに流す
    pub live_echo: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(DEFAULT_WINDOW_SECS),
            drain_timeout: Duration::from_secs(10),
            channel_capacity: 1024,
            live_echo: false,
        }
    }
}

impl WindowConfig {
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Running を抜けた理由
#[derive(Debug)]
enum StopReason {
    Elapsed,
    Cancelled,
    Degraded(String),
}

/// 1セッション分のライフサイクル管理
pub struct WindowController {
    feed: Arc<dyn Feed>,
    config: WindowConfig,
    state: RwLock<WindowState>,
}

impl WindowController {
    pub fn new(feed: Arc<dyn Feed>, config: WindowConfig) -> Self {
        Self {
            feed,
            config,
            state: RwLock::new(WindowState::Idle),
        }
    }

    pub fn state(&self) -> WindowState {
        *self.state.read()
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// セッションを最後まで実行し、凍結したスナップショットを返す
    ///
    /// コントローラーは1回限り。2回目の呼び出しは `SessionError::ControllerUsed`。
    pub async fn run(
        &self,
        aggregator: &StreamAggregator,
        target: &TopicTarget,
        mut cancel: CancelSignal,
    ) -> Result<Arc<Snapshot>, SessionError> {
        {
            let mut state = self.state.write();
            if *state != WindowState::Idle {
                return Err(SessionError::ControllerUsed { state: *state });
            }
            log_state_change("WINDOW", &*state, &WindowState::Connecting);
            *state = WindowState::Connecting;
        }

        if cancel.is_cancelled() {
            self.set_state(WindowState::Closed);
            return Err(SessionError::Cancelled);
        }

        let filter = TopicFilter::new(&target.name);
        let (sink, mut rx) = FeedSink::channel(self.config.channel_capacity);

        tracing::info!(
            "🔌 [WINDOW] Connecting {} feed ({})",
            self.feed.name(),
            filter
        );

        let connection = tokio::select! {
            result = self.feed.connect(&filter, sink) => match result {
                Ok(connection) => connection,
                Err(error) => {
                    tracing::warn!(
                        topic = %target.name,
                        "❌ [WINDOW] Connect failed: {}",
                        error
                    );
                    self.set_state(WindowState::Closed);
                    return Err(error.into());
                }
            },
            _ = cancel.cancelled() => {
                tracing::info!(topic = %target.name, "🛑 [WINDOW] Connect abandoned by cancel");
                self.set_state(WindowState::Closed);
                return Err(SessionError::Cancelled);
            }
        };

        let opened = aggregator
            .open_with_volume(&target.name, target.expected_volume)
            .and_then(|session_id| aggregator.mark_running().map(|_| session_id));
        let session_id = match opened {
            Ok(session_id) => session_id,
            Err(error) => {
                connection.disconnect();
                self.set_state(WindowState::Closed);
                return Err(error.into());
            }
        };

        self.set_state(WindowState::Running);
        tracing::info!(
            topic = %target.name,
            session_id = %session_id,
            "▶️ [WINDOW] Listening for {:?}",
            self.config.duration
        );

        let deadline = tokio::time::sleep(self.config.duration);
        tokio::pin!(deadline);

        let reason = loop {
            tokio::select! {
                _ = &mut deadline => break StopReason::Elapsed,
                _ = cancel.cancelled() => break StopReason::Cancelled,
                signal = rx.recv() => match signal {
                    Some(FeedSignal::Event(tweet)) => self.apply(aggregator, &target.name, &tweet),
                    Some(FeedSignal::Stall { message }) => {
                        break StopReason::Degraded(format!("stall warning: {}", message));
                    }
                    Some(FeedSignal::RemoteDisconnect { reason }) => {
                        break StopReason::Degraded(format!("remote disconnect: {}", reason));
                    }
                    None => break StopReason::Degraded("feed closed unexpectedly".to_string()),
                },
            }
        };

        self.set_state(WindowState::Stopping);
        aggregator.begin_drain()?;
        match &reason {
            StopReason::Elapsed => {
                tracing::debug!(topic = %target.name, "⏰ [WINDOW] Window elapsed");
            }
            StopReason::Cancelled => {
                tracing::info!(topic = %target.name, "🛑 [WINDOW] Session cancelled");
                aggregator.set_cancelled()?;
            }
            StopReason::Degraded(message) => {
                tracing::warn!(
                    topic = %target.name,
                    "⚠️ [WINDOW] Degraded completion: {}",
                    message
                );
                aggregator.mark_degraded(message.clone())?;
            }
        }

        connection.disconnect();
        self.drain(aggregator, &target.name, &mut rx).await?;

        let snapshot = aggregator.close()?;
        self.set_state(WindowState::Closed);

        tracing::info!(
            topic = %snapshot.topic,
            total = snapshot.total_count,
            reposts = snapshot.repost_count,
            completion = ?snapshot.completion,
            "✅ [WINDOW] Session closed"
        );

        Ok(snapshot)
    }

    /// チャネルが閉じる（全ての `FeedSink` が破棄される）まで受信を続ける
    async fn drain(
        &self,
        aggregator: &StreamAggregator,
        topic: &str,
        rx: &mut mpsc::Receiver<FeedSignal>,
    ) -> Result<(), SessionError> {
        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            let mut applied = 0usize;
            while let Some(signal) = rx.recv().await {
                match signal {
                    FeedSignal::Event(tweet) => {
                        self.apply(aggregator, topic, &tweet);
                        applied += 1;
                    }
                    other => {
                        tracing::debug!(topic, "📭 [WINDOW] Signal while draining: {:?}", other);
                    }
                }
            }
            applied
        })
        .await;

        match drained {
            Ok(applied) => {
                tracing::debug!(topic, applied, "🚰 [WINDOW] Drain confirmed");
            }
            Err(_) => {
                tracing::warn!(
                    topic,
                    "⚠️ [WINDOW] Feed did not confirm disconnect within {:?}",
                    self.config.drain_timeout
                );
                aggregator.mark_degraded("drain timed out")?;

                // 既にチャネルに入っているイベントは受理済みなので適用する
                rx.close();
                while let Ok(signal) = rx.try_recv() {
                    if let FeedSignal::Event(tweet) = signal {
                        self.apply(aggregator, topic, &tweet);
                    }
                }
            }
        }

        Ok(())
    }

    fn apply(&self, aggregator: &StreamAggregator, topic: &str, tweet: &Tweet) {
        match aggregator.on_event(tweet) {
            Ok(classification) => {
                if self.config.live_echo {
                    tracing::info!(
                        "{} [{}] @{}: {}",
                        classification.sentiment.symbol(),
                        topic,
                        tweet.author_name,
                        tweet.preview(80)
                    );
                }
            }
            Err(error) => {
                tracing::warn!(topic, tweet_id = %tweet.id, "🚫 [WINDOW] Event not applied: {}", error);
            }
        }
    }

    fn set_state(&self, next: WindowState) {
        let mut state = self.state.write();
        log_state_change("WINDOW", &*state, &next);
        *state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Completion;
    use crate::api::channel_feed::{ChannelFeed, Refusal, ScriptStep};
    use crate::api::feed::ConnectError;
    use crate::session::cancel::CancelHandle;

    fn config(secs: u64) -> WindowConfig {
        WindowConfig::default().with_duration(Duration::from_secs(secs))
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_window_applies_events() {
        let feed = ChannelFeed::new().with_events(
            "rust",
            vec![
                Tweet::original("1", "a", "rust is great"),
                Tweet::retweet("2", "b", "1", "RT rust is great"),
            ],
        );
        let controller = WindowController::new(Arc::new(feed), config(5));
        let aggregator = StreamAggregator::default();

        let snapshot = controller
            .run(&aggregator, &TopicTarget::new("rust"), CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(snapshot.total_count, 2);
        assert_eq!(snapshot.repost_count, 1);
        assert_eq!(snapshot.completion, Completion::Elapsed);
        assert_eq!(controller.state(), WindowState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_never_opens_session() {
        let feed = ChannelFeed::new().with_refusal("rust", Refusal::Auth("bad token".into()));
        let controller = WindowController::new(Arc::new(feed), config(5));
        let aggregator = StreamAggregator::default();

        let result = controller
            .run(&aggregator, &TopicTarget::new("rust"), CancelSignal::never())
            .await;

        assert!(matches!(
            result,
            Err(SessionError::Connect(ConnectError::Auth(_)))
        ));
        assert_eq!(aggregator.status(), None);
        assert_eq!(controller.state(), WindowState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_is_degraded_not_error() {
        let feed = ChannelFeed::new().with_script(
            "rust",
            vec![
                ScriptStep::Event(Tweet::original("1", "a", "rust")),
                ScriptStep::Stall("falling behind".into()),
            ],
        );
        let controller = WindowController::new(Arc::new(feed), config(30));
        let aggregator = StreamAggregator::default();

        let snapshot = controller
            .run(&aggregator, &TopicTarget::new("rust"), CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(snapshot.total_count, 1);
        assert!(snapshot.is_degraded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_events_yields_zero_snapshot() {
        let feed = ChannelFeed::new();
        let controller = WindowController::new(Arc::new(feed), config(30));
        let aggregator = StreamAggregator::default();
        let (handle, signal) = CancelHandle::new();

        let target = TopicTarget::new("quiet");
        let run = controller.run(&aggregator, &target, signal);
        let cancel = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        };
        let (result, _) = tokio::join!(run, cancel);

        let snapshot = result.unwrap();
        assert_eq!(snapshot.total_count, 0);
        assert_eq!(snapshot.completion, Completion::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_controller_is_single_use() {
        let controller = WindowController::new(Arc::new(ChannelFeed::new()), config(1));
        let aggregator = StreamAggregator::default();
        controller
            .run(&aggregator, &TopicTarget::new("t"), CancelSignal::never())
            .await
            .unwrap();

        let again = controller
            .run(
                &StreamAggregator::default(),
                &TopicTarget::new("t"),
                CancelSignal::never(),
            )
            .await;
        assert!(matches!(
            again,
            Err(SessionError::ControllerUsed {
                state: WindowState::Closed
            })
        ));
    }
}
