//! ストリーム集計器
//!
//! 1つのライブセッションの状態（`SessionState`）を排他的に所有し、
//! 並行に届くイベントを直列化された更新として適用する。
//! 読み手には `close()` で凍結した `Snapshot` のみを公開する。

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use super::classifier::{Classification, Classifier, Sentiment};
use super::snapshot::{Completion, SessionId, Snapshot};
use crate::api::tweet::{Tweet, TweetId};

/// セッション状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Running,
    Draining,
    Closed,
}

impl SessionStatus {
    /// カウンター更新を受け付ける状態か
    pub fn is_accepting(&self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Draining)
    }
}

/// 集計器の誤用エラー
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("Session already opened for topic '{topic}'")]
    AlreadyOpen { topic: String },

    #[error("Session not opened")]
    NotOpen,

    #[error("Session '{topic}' is not running (status: {status:?})")]
    NotRunning {
        topic: String,
        status: SessionStatus,
    },

    #[error("Session '{topic}' is already closed")]
    Closed { topic: String },
}

#[derive(Debug)]
struct SessionState {
    session_id: SessionId,
    topic: String,
    expected_volume: Option<u64>,
    total_count: u64,
    original_count: u64,
    repost_count: u64,
    positive_count: u64,
    negative_count: u64,
    seen_dedup_keys: HashSet<TweetId>,
    influence_total: u64,
    rejected_events: u64,
    status: SessionStatus,
    opened_at: chrono::DateTime<chrono::Utc>,
    started: tokio::time::Instant,
    degraded: Option<String>,
    cancelled: bool,
}

impl SessionState {
    fn new(topic: String, expected_volume: Option<u64>) -> Self {
        Self {
            session_id: SessionId::new(),
            topic,
            expected_volume,
            total_count: 0,
            original_count: 0,
            repost_count: 0,
            positive_count: 0,
            negative_count: 0,
            seen_dedup_keys: HashSet::new(),
            influence_total: 0,
            rejected_events: 0,
            status: SessionStatus::Idle,
            opened_at: chrono::Utc::now(),
            started: tokio::time::Instant::now(),
            degraded: None,
            cancelled: false,
        }
    }

    fn apply(&mut self, classification: &Classification) {
        self.total_count += 1;

        if classification.is_repost {
            self.repost_count += 1;
            // 最初に見た元投稿のみユニーク数に加える
            if !self.seen_dedup_keys.contains(&classification.dedup_key) {
                self.seen_dedup_keys
                    .insert(classification.dedup_key.clone());
            }
        } else {
            self.original_count += 1;
        }

        match classification.sentiment {
            Sentiment::Positive => self.positive_count += 1,
            Sentiment::Negative => self.negative_count += 1,
        }

        self.influence_total = self.influence_total.saturating_add(classification.influence);
    }

    fn transition(&mut self, next: SessionStatus) {
        if self.status != next {
            tracing::debug!(
                topic = %self.topic,
                from = ?self.status,
                to = ?next,
                "🔄 [AGGREGATOR] Session status changed"
            );
            self.status = next;
        }
    }

    fn freeze(self) -> Snapshot {
        let completion = match (self.degraded, self.cancelled) {
            (Some(reason), _) => Completion::Degraded { reason },
            (None, true) => Completion::Cancelled,
            (None, false) => Completion::Elapsed,
        };

        Snapshot {
            session_id: self.session_id,
            topic: self.topic,
            expected_volume: self.expected_volume,
            total_count: self.total_count,
            original_count: self.original_count,
            repost_count: self.repost_count,
            positive_count: self.positive_count,
            negative_count: self.negative_count,
            influence_total: self.influence_total,
            seen_dedup_keys: self.seen_dedup_keys.into_iter().collect(),
            rejected_events: self.rejected_events,
            opened_at: self.opened_at,
            closed_at: chrono::Utc::now(),
            elapsed: self.started.elapsed(),
            completion,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Unopened,
    Open(SessionState),
    Closed(Arc<Snapshot>),
}

/// ストリーム集計器
///
/// `&self` で操作でき、複数スレッドから同時に `on_event` を呼んでも
/// 各イベントはちょうど1回だけ適用される。
#[derive(Debug)]
pub struct StreamAggregator {
    classifier: Classifier,
    phase: Mutex<Phase>,
}

impl StreamAggregator {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            phase: Mutex::new(Phase::Unopened),
        }
    }

    /// 新しいセッション状態（Idle）を確保
    pub fn open(&self, topic: impl Into<String>) -> Result<SessionId, AggregatorError> {
        self.open_with_volume(topic, None)
    }

    /// 想定ボリューム付きでセッションを開く
    pub fn open_with_volume(
        &self,
        topic: impl Into<String>,
        expected_volume: Option<u64>,
    ) -> Result<SessionId, AggregatorError> {
        let mut phase = self.phase.lock();
        match &*phase {
            Phase::Unopened => {
                let state = SessionState::new(topic.into(), expected_volume);
                let session_id = state.session_id;
                tracing::debug!(
                    topic = %state.topic,
                    session_id = %session_id,
                    "📂 [AGGREGATOR] Session opened"
                );
                *phase = Phase::Open(state);
                Ok(session_id)
            }
            Phase::Open(state) => Err(AggregatorError::AlreadyOpen {
                topic: state.topic.clone(),
            }),
            Phase::Closed(snapshot) => Err(AggregatorError::AlreadyOpen {
                topic: snapshot.topic.clone(),
            }),
        }
    }

    /// Idle → Running（フィード接続完了時）
    pub fn mark_running(&self) -> Result<(), AggregatorError> {
        self.with_open_state(|state| {
            if state.status == SessionStatus::Idle {
                state.transition(SessionStatus::Running);
            }
        })
    }

    /// Running → Draining
    pub fn begin_drain(&self) -> Result<(), AggregatorError> {
        self.with_open_state(|state| {
            if state.status.is_accepting() {
                state.transition(SessionStatus::Draining);
            }
        })
    }

    /// 縮退完了の理由を記録（最初の理由を保持）
    pub fn mark_degraded(&self, reason: impl Into<String>) -> Result<(), AggregatorError> {
        let reason = reason.into();
        self.with_open_state(move |state| {
            if state.degraded.is_none() {
                state.degraded = Some(reason);
            }
        })
    }

    /// 外部キャンセルで終了したことを記録
    pub fn set_cancelled(&self) -> Result<(), AggregatorError> {
        self.with_open_state(|state| state.cancelled = true)
    }

    /// 配信されたイベントを1件適用
    pub fn on_event(&self, tweet: &Tweet) -> Result<Classification, AggregatorError> {
        let classification = self.classifier.classify(tweet);

        let mut phase = self.phase.lock();
        match &mut *phase {
            Phase::Unopened => Err(AggregatorError::NotOpen),
            Phase::Closed(snapshot) => {
                tracing::debug!(
                    topic = %snapshot.topic,
                    tweet_id = %tweet.id,
                    "🚫 [AGGREGATOR] Event after close ignored"
                );
                Err(AggregatorError::Closed {
                    topic: snapshot.topic.clone(),
                })
            }
            Phase::Open(state) if state.status.is_accepting() => {
                state.apply(&classification);
                Ok(classification)
            }
            Phase::Open(state) => {
                state.rejected_events += 1;
                tracing::debug!(
                    topic = %state.topic,
                    tweet_id = %tweet.id,
                    status = ?state.status,
                    "🚫 [AGGREGATOR] Event rejected"
                );
                Err(AggregatorError::NotRunning {
                    topic: state.topic.clone(),
                    status: state.status,
                })
            }
        }
    }

    /// Draining → Closed。凍結したスナップショットを返す（2回目以降は同じもの）
    pub fn close(&self) -> Result<Arc<Snapshot>, AggregatorError> {
        let mut phase = self.phase.lock();
        match std::mem::replace(&mut *phase, Phase::Unopened) {
            Phase::Unopened => Err(AggregatorError::NotOpen),
            Phase::Closed(snapshot) => {
                *phase = Phase::Closed(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            Phase::Open(mut state) => {
                state.transition(SessionStatus::Draining);
                state.transition(SessionStatus::Closed);
                let snapshot = Arc::new(state.freeze());
                tracing::debug!(
                    topic = %snapshot.topic,
                    total = snapshot.total_count,
                    completion = ?snapshot.completion,
                    "🔒 [AGGREGATOR] Session closed"
                );
                *phase = Phase::Closed(Arc::clone(&snapshot));
                Ok(snapshot)
            }
        }
    }

    pub fn status(&self) -> Option<SessionStatus> {
        match &*self.phase.lock() {
            Phase::Unopened => None,
            Phase::Open(state) => Some(state.status),
            Phase::Closed(_) => Some(SessionStatus::Closed),
        }
    }

    fn with_open_state<F>(&self, f: F) -> Result<(), AggregatorError>
    where
        F: FnOnce(&mut SessionState),
    {
        match &mut *self.phase.lock() {
            Phase::Unopened => Err(AggregatorError::NotOpen),
            Phase::Closed(snapshot) => Err(AggregatorError::Closed {
                topic: snapshot.topic.clone(),
            }),
            Phase::Open(state) => {
                f(state);
                Ok(())
            }
        }
    }
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new(Classifier::default())
    }
}
