//! NDJSONリプレイの結合テスト

use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use twitlive::api::{ReplayConfig, ReplayFeed};
use twitlive::io::write_ndjson;
use twitlive::report;
use twitlive::session::{
    CancelSignal, ExecutionMode, MultiSessionOrchestrator, OrchestratorConfig, TargetSelection,
    TargetStatus, TopicTarget, WindowConfig,
};
use twitlive::{Classifier, Tweet};

fn capture() -> Vec<Tweet> {
    vec![
        Tweet::original("1", "alice", "Rust 2024 edition is great").with_followers(120),
        Tweet::retweet("2", "bob", "1", "RT @alice: Rust 2024 edition is great"),
        Tweet::original("3", "carol", "golang release notes"),
        Tweet::retweet("4", "dave", "1", "RT @alice: Rust 2024 edition is great"),
        Tweet::original("5", "erin", "why I moved from Go to rust"),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_replay_sessions_filter_by_topic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("capture.ndjson");
    write_ndjson(&path, &capture()).unwrap();

    let feed = ReplayFeed::new(
        &path,
        ReplayConfig {
            interval: Duration::from_millis(10),
            ..ReplayConfig::default()
        },
    );
    let orchestrator = MultiSessionOrchestrator::new(
        Arc::new(feed),
        Classifier::default(),
        OrchestratorConfig {
            window: WindowConfig::default().with_duration(Duration::from_secs(5)),
            mode: ExecutionMode::Sequential,
            selection: TargetSelection::All,
        },
    );

    let targets = vec![TopicTarget::new("rust"), TopicTarget::new("go")];
    let report = orchestrator.run(&targets, CancelSignal::never()).await;

    assert!(report.reports.iter().all(|r| r.status() == TargetStatus::Success));

    let rust = report.reports[0].outcome.snapshot().unwrap();
    assert_eq!(rust.total_count, 4);
    assert_eq!(rust.repost_count, 2);
    assert_eq!(rust.unique_repost_count(), 1);
    assert_eq!(rust.influence_total, 120);

    // "golang" と "Go to rust" の2件
    let go = report.reports[1].outcome.snapshot().unwrap();
    assert_eq!(go.total_count, 2);

    assert_eq!(report.summary.total_count, 6);
    assert_eq!(report.summary.percent_of_volume(), None);

    let table = report::render_summary_table("Query", &report);
    assert!(table.contains("rust"));
    assert!(table.contains("Summary"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_capture_fails_target() {
    let dir = tempdir().unwrap();
    let feed = ReplayFeed::new(dir.path().join("missing.ndjson"), ReplayConfig::default());
    let orchestrator = MultiSessionOrchestrator::new(
        Arc::new(feed),
        Classifier::default(),
        OrchestratorConfig::default(),
    );

    let report = orchestrator
        .run(&[TopicTarget::new("rust")], CancelSignal::never())
        .await;
    assert_eq!(report.reports[0].status(), TargetStatus::Failed);
    assert_eq!(report.summary.failed, 1);
}
