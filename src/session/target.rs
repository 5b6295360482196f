use serde::{Deserialize, Serialize};

/// 追跡対象のトピック（オーケストレーターへの入力。変更されない）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTarget {
    pub name: String,
    /// 外部トレンドデータが報告する想定ツイート数
    #[serde(default)]
    pub expected_volume: Option<u64>,
}

impl TopicTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expected_volume: None,
        }
    }

    pub fn with_volume(name: impl Into<String>, expected_volume: u64) -> Self {
        Self {
            name: name.into(),
            expected_volume: Some(expected_volume),
        }
    }
}

/// 実行するターゲットの選択
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetSelection {
    #[default]
    All,
    Top(usize),
}

impl TargetSelection {
    pub fn apply<'a>(&self, targets: &'a [TopicTarget]) -> &'a [TopicTarget] {
        match self {
            TargetSelection::All => targets,
            TargetSelection::Top(n) => &targets[..(*n).min(targets.len())],
        }
    }
}

impl std::str::FromStr for TargetSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("all") {
            return Ok(TargetSelection::All);
        }
        value
            .parse::<usize>()
            .map(TargetSelection::Top)
            .map_err(|_| format!("expected a number or 'all', got '{}'", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_parsing_and_apply() {
        let targets = vec![
            TopicTarget::new("a"),
            TopicTarget::with_volume("b", 10),
            TopicTarget::new("c"),
        ];

        let all: TargetSelection = "ALL".parse().unwrap();
        assert_eq!(all.apply(&targets).len(), 3);

        let two: TargetSelection = "2".parse().unwrap();
        assert_eq!(two.apply(&targets), &targets[..2]);

        assert_eq!(TargetSelection::Top(10).apply(&targets).len(), 3);
        assert!("many".parse::<TargetSelection>().is_err());
    }
}
