//! 複数セッションの合算サマリー

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::snapshot::{percent, round_to, Snapshot};

/// 全ターゲットの合算値
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedSummary {
    pub sessions: usize,
    pub succeeded: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_count: u64,
    pub original_count: u64,
    pub repost_count: u64,
    pub unique_repost_count: u64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub influence_total: u64,
    /// 完了したターゲットが報告していた想定ボリュームの合計
    pub expected_volume: u64,
    pub elapsed: Duration,
}

impl CombinedSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshots<'a>(snapshots: impl IntoIterator<Item = &'a Snapshot>) -> Self {
        let mut summary = Self::new();
        for snapshot in snapshots {
            summary.add_snapshot(snapshot);
        }
        summary
    }

    /// 完了（縮退含む）セッションを加算
    pub fn add_snapshot(&mut self, snapshot: &Snapshot) {
        self.sessions += 1;
        if snapshot.is_degraded() {
            self.degraded += 1;
        } else {
            self.succeeded += 1;
        }

        self.total_count += snapshot.total_count;
        self.original_count += snapshot.original_count;
        self.repost_count += snapshot.repost_count;
        self.unique_repost_count += snapshot.unique_repost_count();
        self.positive_count += snapshot.positive_count;
        self.negative_count += snapshot.negative_count;
        self.influence_total = self.influence_total.saturating_add(snapshot.influence_total);
        self.expected_volume += snapshot.expected_volume.unwrap_or(0);
        self.elapsed += snapshot.elapsed;
    }

    pub fn add_failed(&mut self) {
        self.sessions += 1;
        self.failed += 1;
    }

    pub fn add_skipped(&mut self) {
        self.sessions += 1;
        self.skipped += 1;
    }

    pub fn percent_repost(&self) -> f64 {
        percent(self.repost_count, self.total_count, 2)
    }

    pub fn percent_unique_repost(&self) -> f64 {
        percent(self.unique_repost_count, self.repost_count, 2)
    }

    pub fn sentiment_split(&self) -> (f64, f64) {
        (
            percent(self.positive_count, self.total_count, 2),
            percent(self.negative_count, self.total_count, 2),
        )
    }

    /// 全セッションの計測時間に対する1分あたりのツイート数
    pub fn rate_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        round_to(self.total_count as f64 / minutes, 2)
    }

    /// 想定ボリュームのうち観測できた割合（%）。想定ボリューム不明なら `None`
    pub fn percent_of_volume(&self) -> Option<f64> {
        if self.expected_volume == 0 {
            None
        } else {
            Some(percent(self.total_count, self.expected_volume, 4))
        }
    }
}
