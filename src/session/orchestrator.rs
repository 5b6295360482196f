//! マルチセッション・オーケストレーター
//!
//! ターゲットごとに `WindowController` と `StreamAggregator` の組を1つずつ作り、
//! 逐次または上限付き並行で実行する。各ターゲットの失敗・縮退は独立して記録され、
//! 他のターゲットを中断しない。合算サマリーは全セッションが終わってから作成する。

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::cancel::CancelSignal;
use super::target::{TargetSelection, TopicTarget};
use super::window::{WindowConfig, WindowController};
use super::SessionError;
use crate::analytics::{Classifier, CombinedSummary, Snapshot, StreamAggregator};
use crate::api::feed::Feed;

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecutionMode {
    /// 1度に1トピックのみ（レート制限を避ける既定の動作）
    #[default]
    Sequential,
    /// 最大 `max_sessions` 個まで同時実行
    Concurrent { max_sessions: usize },
}

/// オーケストレーター設定
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub window: WindowConfig,
    pub mode: ExecutionMode,
    pub selection: TargetSelection,
}

/// ターゲットの結果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TargetOutcome {
    /// Closed まで到達（縮退を含む）
    Completed { snapshot: Arc<Snapshot> },
    /// 接続失敗など
    Failed { error: String },
    /// 接続前にキャンセルを観測
    Skipped,
}

/// レポート用のターゲット状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    #[display("ok")]
    Success,
    #[display("degraded")]
    Degraded,
    #[display("failed")]
    Failed,
    #[display("skipped")]
    Skipped,
}

impl TargetOutcome {
    pub fn status(&self) -> TargetStatus {
        match self {
            TargetOutcome::Completed { snapshot } if snapshot.is_degraded() => TargetStatus::Degraded,
            TargetOutcome::Completed { .. } => TargetStatus::Success,
            TargetOutcome::Failed { .. } => TargetStatus::Failed,
            TargetOutcome::Skipped => TargetStatus::Skipped,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            TargetOutcome::Completed { snapshot } => Some(snapshot),
            _ => None,
        }
    }
}

/// 1ターゲット分の報告
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    /// 入力順の位置（0始まり）
    pub index: usize,
    pub target: TopicTarget,
    #[serde(flatten)]
    pub outcome: TargetOutcome,
}

impl TargetReport {
    pub fn status(&self) -> TargetStatus {
        self.outcome.status()
    }
}

/// 全ターゲットの報告と合算値
#[derive(Debug, Clone, Serialize)]
pub struct CombinedReport {
    pub reports: Vec<TargetReport>,
    pub summary: CombinedSummary,
}

impl CombinedReport {
    fn from_reports(reports: Vec<TargetReport>) -> Self {
        let mut summary = CombinedSummary::new();
        for report in &reports {
            match &report.outcome {
                TargetOutcome::Completed { snapshot } => summary.add_snapshot(snapshot),
                TargetOutcome::Failed { .. } => summary.add_failed(),
                TargetOutcome::Skipped => summary.add_skipped(),
            }
        }
        Self { reports, summary }
    }

    pub fn snapshots(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.reports.iter().filter_map(|report| report.outcome.snapshot())
    }
}

/// マルチセッション・オーケストレーター
pub struct MultiSessionOrchestrator {
    feed: Arc<dyn Feed>,
    classifier: Classifier,
    config: OrchestratorConfig,
}

impl MultiSessionOrchestrator {
    pub fn new(feed: Arc<dyn Feed>, classifier: Classifier, config: OrchestratorConfig) -> Self {
        Self {
            feed,
            classifier,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 選択されたターゲットを全て実行し、入力順の報告を返す
    pub async fn run(&self, targets: &[TopicTarget], cancel: CancelSignal) -> CombinedReport {
        let selected = self.config.selection.apply(targets);
        let total = selected.len();

        tracing::info!(
            "🚀 [ORCHESTRATOR] Running {} of {} targets ({:?}, window {:?})",
            total,
            targets.len(),
            self.config.mode,
            self.config.window.duration
        );

        let reports = match self.config.mode {
            ExecutionMode::Sequential => {
                let mut reports = Vec::with_capacity(total);
                for (index, target) in selected.iter().enumerate() {
                    let outcome = self.run_target(index, total, target, cancel.clone()).await;
                    reports.push(TargetReport {
                        index,
                        target: target.clone(),
                        outcome,
                    });
                }
                reports
            }
            ExecutionMode::Concurrent { max_sessions } => {
                let gate = Semaphore::new(max_sessions.max(1));
                let gate = &gate;
                let sessions = selected.iter().enumerate().map(|(index, target)| {
                    let mut cancel = cancel.clone();
                    async move {
                        let permit = tokio::select! {
                            permit = gate.acquire() => permit.ok(),
                            _ = cancel.cancelled() => None,
                        };
                        let outcome = match permit {
                            Some(_permit) => self.run_target(index, total, target, cancel).await,
                            None => {
                                tracing::info!(
                                    "⏭️ [ORCHESTRATOR] {}/{} [ {} ] skipped while waiting",
                                    index + 1,
                                    total,
                                    target.name
                                );
                                TargetOutcome::Skipped
                            }
                        };
                        TargetReport {
                            index,
                            target: target.clone(),
                            outcome,
                        }
                    }
                });
                // join_all は入力順を保つ
                join_all(sessions).await
            }
        };

        let report = CombinedReport::from_reports(reports);
        tracing::info!(
            sessions = report.summary.sessions,
            succeeded = report.summary.succeeded,
            degraded = report.summary.degraded,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            total = report.summary.total_count,
            "🏁 [ORCHESTRATOR] All sessions finished"
        );
        report
    }

    async fn run_target(
        &self,
        index: usize,
        total: usize,
        target: &TopicTarget,
        cancel: CancelSignal,
    ) -> TargetOutcome {
        if cancel.is_cancelled() {
            tracing::info!(
                "⏭️ [ORCHESTRATOR] {}/{} [ {} ] skipped after cancel",
                index + 1,
                total,
                target.name
            );
            return TargetOutcome::Skipped;
        }

        let volume = target
            .expected_volume
            .map(|volume| volume.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        tracing::info!(
            "📊 [ORCHESTRATOR] {}/{} [ {} ] - Volume: {}",
            index + 1,
            total,
            target.name,
            volume
        );

        let aggregator = StreamAggregator::new(self.classifier.clone());
        let controller = WindowController::new(Arc::clone(&self.feed), self.config.window.clone());

        match controller.run(&aggregator, target, cancel).await {
            Ok(snapshot) => TargetOutcome::Completed { snapshot },
            Err(SessionError::Cancelled) => TargetOutcome::Skipped,
            Err(error) => {
                tracing::warn!(
                    topic = %target.name,
                    "❌ [ORCHESTRATOR] Target failed: {}",
                    error
                );
                TargetOutcome::Failed {
                    error: error.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::channel_feed::{ChannelFeed, Refusal};
    use crate::api::tweet::Tweet;
    use crate::session::cancel::CancelHandle;
    use std::time::Duration;

    fn config(mode: ExecutionMode) -> OrchestratorConfig {
        OrchestratorConfig {
            window: WindowConfig::default().with_duration(Duration::from_secs(2)),
            mode,
            selection: TargetSelection::All,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_target_does_not_abort_siblings() {
        let feed = ChannelFeed::new()
            .with_events("a", vec![Tweet::original("1", "u", "a")])
            .with_refusal("b", Refusal::Network("unreachable".into()))
            .with_events("c", vec![Tweet::original("2", "u", "c")]);
        let orchestrator = MultiSessionOrchestrator::new(
            Arc::new(feed),
            Classifier::default(),
            config(ExecutionMode::Sequential),
        );

        let targets = vec![
            TopicTarget::new("a"),
            TopicTarget::new("b"),
            TopicTarget::new("c"),
        ];
        let report = orchestrator.run(&targets, CancelSignal::never()).await;

        let statuses: Vec<_> = report.reports.iter().map(|r| r.status()).collect();
        assert_eq!(
            statuses,
            vec![TargetStatus::Success, TargetStatus::Failed, TargetStatus::Success]
        );
        assert_eq!(report.summary.total_count, 2);
        assert_eq!(report.summary.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_limits_targets() {
        let mut config = config(ExecutionMode::Sequential);
        config.selection = TargetSelection::Top(1);
        let orchestrator =
            MultiSessionOrchestrator::new(Arc::new(ChannelFeed::new()), Classifier::default(), config);

        let targets = vec![TopicTarget::new("a"), TopicTarget::new("b")];
        let report = orchestrator.run(&targets, CancelSignal::never()).await;
        assert_eq!(report.reports.len(), 1);
        assert_eq!(report.reports[0].target.name, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_run_skips_everything() {
        let feed = Arc::new(ChannelFeed::new());
        let orchestrator = MultiSessionOrchestrator::new(
            feed.clone(),
            Classifier::default(),
            config(ExecutionMode::Concurrent { max_sessions: 2 }),
        );
        let (handle, signal) = CancelHandle::new();
        handle.cancel();

        let targets = vec![TopicTarget::new("a"), TopicTarget::new("b")];
        let report = orchestrator.run(&targets, signal).await;

        assert_eq!(report.summary.skipped, 2);
        assert_eq!(feed.connect_attempts(), 0);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let report = TargetReport {
            index: 0,
            target: TopicTarget::with_volume("rust", 100),
            outcome: TargetOutcome::Failed {
                error: "boom".into(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["error"], "boom");
        assert_eq!(json["target"]["expected_volume"], 100);
    }
}
