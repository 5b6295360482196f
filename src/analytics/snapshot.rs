//! 凍結済みセッション結果（スナップショット）
//!
//! `Closed` 時点で一度だけ作成され、以後は変更されない。派生指標は呼び出し時に計算する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::api::tweet::TweetId;

/// セッションID
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// セッションの終了理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Completion {
    /// ウィンドウ時間が満了
    Elapsed,
    /// 外部キャンセル
    Cancelled,
    /// フィードの停滞・切断による部分結果
    Degraded { reason: String },
}

/// 小数点以下 `decimals` 桁に丸めた百分率。分母0なら0
pub(crate) fn percent(numerator: u64, denominator: u64, decimals: i32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    round_to(numerator as f64 / denominator as f64 * 100.0, decimals)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// 1セッションの凍結結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_id: SessionId,
    pub topic: String,
    /// 外部トレンドデータによる想定ボリューム
    pub expected_volume: Option<u64>,
    pub total_count: u64,
    pub original_count: u64,
    pub repost_count: u64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub influence_total: u64,
    pub seen_dedup_keys: BTreeSet<TweetId>,
    /// 受付状態でなかったため適用されなかったイベント数
    pub rejected_events: u64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub completion: Completion,
}

impl Snapshot {
    pub fn unique_repost_count(&self) -> u64 {
        self.seen_dedup_keys.len() as u64
    }

    /// リツイート率（%）
    pub fn percent_repost(&self) -> f64 {
        percent(self.repost_count, self.total_count, 2)
    }

    /// リツイートのうちユニークな元投稿の割合（%）
    pub fn percent_unique_repost(&self) -> f64 {
        percent(self.unique_repost_count(), self.repost_count, 2)
    }

    /// (肯定%, 否定%)
    pub fn sentiment_split(&self) -> (f64, f64) {
        (
            percent(self.positive_count, self.total_count, 2),
            percent(self.negative_count, self.total_count, 2),
        )
    }

    /// 1分あたりのツイート数
    pub fn rate_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        round_to(self.total_count as f64 / minutes, 2)
    }

    pub fn average_influence(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        round_to(self.influence_total as f64 / self.total_count as f64, 2)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.completion, Completion::Degraded { .. })
    }
}
