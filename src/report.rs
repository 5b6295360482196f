//! レポート出力
//!
//! 凍結済みスナップショットと合算サマリーをテキスト表・JSONに整形する。
//! 集計コアは整形を行わず、ここが表示の責務を持つ。

use std::path::Path;

use crate::analytics::{CombinedSummary, Snapshot};
use crate::session::{CombinedReport, TargetReport};

/// レポート出力エラー
#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

const COLUMNS: [&str; 9] = [
    "Total Tweets",
    "Sentiment % (+/-)",
    "Regular Tweets",
    "Retweets",
    "Unique Retweets",
    "twt/min",
    "% Retweets",
    "% Unique Retweets",
    "Status",
];

/// 罫線付きの左寄せテキスト表
#[derive(Debug, Default)]
struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn new(first_column: &str) -> Self {
        let mut headers = vec![first_column.to_string()];
        headers.extend(COLUMNS.iter().map(|c| c.to_string()));
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }

    fn render(&self) -> String {
        let widths = self.widths();
        let border = |left: &str, mid: &str, right: &str| {
            let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("{}{}{}\n", left, segments.join(mid), right)
        };
        let line = |cells: &[String]| {
            let padded: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, width)| {
                    let cell = cells.get(i).map(String::as_str).unwrap_or("");
                    let pad = width - cell.chars().count();
                    format!(" {}{} ", cell, " ".repeat(pad))
                })
                .collect();
            format!("│{}│\n", padded.join("│"))
        };

        let mut out = border("┌", "┬", "┐");
        out.push_str(&line(&self.headers));
        out.push_str(&border("├", "┼", "┤"));
        for row in &self.rows {
            out.push_str(&line(row));
        }
        out.push_str(&border("└", "┴", "┘"));
        out
    }
}

fn snapshot_row(name: &str, snapshot: &Snapshot, status: &str) -> Vec<String> {
    let (positive, negative) = snapshot.sentiment_split();
    vec![
        name.to_string(),
        snapshot.total_count.to_string(),
        format!("({}, {})", positive, negative),
        snapshot.original_count.to_string(),
        snapshot.repost_count.to_string(),
        snapshot.unique_repost_count().to_string(),
        snapshot.rate_per_minute().to_string(),
        snapshot.percent_repost().to_string(),
        snapshot.percent_unique_repost().to_string(),
        status.to_string(),
    ]
}

fn report_row(report: &TargetReport) -> Vec<String> {
    let status = report.status().to_string();
    match report.outcome.snapshot() {
        Some(snapshot) => snapshot_row(&report.target.name, snapshot, &status),
        None => {
            let mut row = vec![report.target.name.clone()];
            row.extend(std::iter::repeat("-".to_string()).take(COLUMNS.len() - 1));
            row.push(status);
            row
        }
    }
}

fn summary_row(summary: &CombinedSummary) -> Vec<String> {
    let (positive, negative) = summary.sentiment_split();
    vec![
        "Summary".to_string(),
        summary.total_count.to_string(),
        format!("({}, {})", positive, negative),
        summary.original_count.to_string(),
        summary.repost_count.to_string(),
        summary.unique_repost_count.to_string(),
        summary.rate_per_minute().to_string(),
        summary.percent_repost().to_string(),
        summary.percent_unique_repost().to_string(),
        format!(
            "{} ok / {} degraded / {} failed",
            summary.succeeded, summary.degraded, summary.failed
        ),
    ]
}

/// 各ターゲットを1行ずつ並べた表
pub fn render_session_table(label: &str, reports: &[TargetReport]) -> String {
    let mut table = TextTable::new(label);
    for report in reports {
        table.push(report_row(report));
    }
    table.render()
}

/// ターゲット行の後に合算行を加えた表
pub fn render_summary_table(label: &str, report: &CombinedReport) -> String {
    let mut table = TextTable::new(label);
    for target in &report.reports {
        table.push(report_row(target));
    }
    table.push(summary_row(&report.summary));
    table.render()
}

/// 3桁区切り
fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// 想定ボリュームに対する処理割合と内訳
pub fn render_volume_lines(summary: &CombinedSummary) -> String {
    let first = match summary.percent_of_volume() {
        Some(percent) => format!(
            "Processed {}% of total volume - [ {} tweets ]",
            percent,
            group_thousands(summary.total_count)
        ),
        None => format!(
            "Processed [ {} tweets ] (total volume unknown)",
            group_thousands(summary.total_count)
        ),
    };
    format!(
        "{}\n[ {} regular ] [ {} retweets ] [ {} unique retweets ]\n",
        first, summary.original_count, summary.repost_count, summary.unique_repost_count
    )
}

/// 報告全体を整形済み JSON に変換
pub fn to_json(report: &CombinedReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_json(path: impl AsRef<Path>, report: &CombinedReport) -> Result<(), ReportError> {
    let path = path.as_ref();
    std::fs::write(path, to_json(report)?)?;
    tracing::info!("💾 Report written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::snapshot::test_support::snapshot_with;
    use crate::session::{TargetOutcome, TopicTarget};
    use std::sync::Arc;

    fn combined() -> CombinedReport {
        let mut snapshot = snapshot_with("rust", 10, 3, 2);
        snapshot.expected_volume = Some(2000);
        let reports = vec![
            TargetReport {
                index: 0,
                target: TopicTarget::with_volume("rust", 2000),
                outcome: TargetOutcome::Completed {
                    snapshot: Arc::new(snapshot.clone()),
                },
            },
            TargetReport {
                index: 1,
                target: TopicTarget::new("go"),
                outcome: TargetOutcome::Failed {
                    error: "auth".into(),
                },
            },
        ];
        let mut summary = CombinedSummary::from_snapshots([&snapshot]);
        summary.add_failed();
        CombinedReport { reports, summary }
    }

    #[test]
    fn test_summary_table_has_rows_in_order() {
        let rendered = render_summary_table("Trend", &combined());
        let lines: Vec<&str> = rendered.lines().collect();

        // 上罫線, 見出し, 区切り, 2ターゲット, 合算, 下罫線
        assert_eq!(lines.len(), 7);
        assert!(lines[1].contains("Trend"));
        assert!(lines[1].contains("% Unique Retweets"));
        assert!(lines[3].contains("rust"));
        assert!(lines[3].contains("66.67"));
        assert!(lines[4].contains("go"));
        assert!(lines[4].contains("failed"));
        assert!(lines[5].contains("Summary"));

        // 全行が同じ幅
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|line| line.chars().count() == width));
    }

    #[test]
    fn test_volume_line() {
        let summary = combined().summary;
        let lines = render_volume_lines(&summary);
        assert!(lines.starts_with("Processed 0.5% of total volume - [ 10 tweets ]"));

        let unknown = render_volume_lines(&CombinedSummary::new());
        assert!(unknown.contains("total volume unknown"));
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1234567), "1,234,567");
    }

    #[test]
    fn test_json_export() {
        let json = to_json(&combined()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["reports"][0]["outcome"], "completed");
        assert_eq!(value["reports"][0]["snapshot"]["total_count"], 10);
        assert_eq!(value["reports"][1]["outcome"], "failed");
        assert_eq!(value["summary"]["total_count"], 10);
    }
}
