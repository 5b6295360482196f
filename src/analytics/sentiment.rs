//! 感情極性スコアラー
//!
//! `PolarityScorer` はテキストを -1.0..=1.0 の極性値に変換する外部能力。
//! 分類器は `> 0` を肯定、それ以外を否定として扱う。

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// テキスト → 極性
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}

impl<F> PolarityScorer for F
where
    F: Fn(&str) -> f64 + Send + Sync,
{
    fn polarity(&self, text: &str) -> f64 {
        self(text)
    }
}

const POSITIVE_WORDS: &[(&str, f64)] = &[
    ("good", 0.7),
    ("great", 0.8),
    ("love", 0.5),
    ("loved", 0.7),
    ("awesome", 1.0),
    ("amazing", 0.6),
    ("excellent", 1.0),
    ("best", 1.0),
    ("happy", 0.8),
    ("nice", 0.6),
    ("win", 0.8),
    ("wins", 0.8),
    ("beautiful", 0.85),
    ("fantastic", 0.4),
    ("fun", 0.3),
    ("glad", 0.5),
    ("cool", 0.35),
    ("thanks", 0.2),
    ("congrats", 0.5),
    ("wonderful", 1.0),
    ("perfect", 1.0),
    ("exciting", 0.3),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("bad", -0.7),
    ("worst", -1.0),
    ("hate", -0.8),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("sad", -0.5),
    ("angry", -0.5),
    ("poor", -0.4),
    ("fail", -0.5),
    ("failed", -0.5),
    ("broken", -0.4),
    ("wrong", -0.5),
    ("horrible", -1.0),
    ("ugly", -0.7),
    ("lose", -0.4),
    ("lost", -0.4),
    ("stupid", -0.8),
    ("boring", -1.0),
    ("scary", -0.5),
    ("disappointing", -0.6),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "don't", "isn't", "wasn't", "can't"];

const INTENSIFIERS: &[(&str, f64)] = &[("very", 1.3), ("really", 1.2), ("so", 1.2), ("extremely", 1.5)];

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z']+").expect("valid word regex"))
}

/// 単語リストベースの簡易スコアラー
///
/// 直前の否定語で符号を反転し、強調語で倍率をかける。結果は平均値を [-1, 1] に丸めたもの。
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    weights: HashMap<String, f64>,
}

impl LexiconScorer {
    pub fn new() -> Self {
        let weights = POSITIVE_WORDS
            .iter()
            .chain(NEGATIVE_WORDS.iter())
            .map(|(word, weight)| (word.to_string(), *weight))
            .collect();
        Self { weights }
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for LexiconScorer {
    fn polarity(&self, text: &str) -> f64 {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = word_pattern()
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .collect();

        let mut total = 0.0;
        let mut hits = 0usize;
        for (index, word) in words.iter().enumerate() {
            let Some(weight) = self.weights.get(*word) else {
                continue;
            };

            let mut score = *weight;
            if index > 0 {
                let previous = words[index - 1];
                if let Some((_, factor)) = INTENSIFIERS.iter().find(|(w, _)| *w == previous) {
                    score *= factor;
                }
            }
            let window_start = index.saturating_sub(2);
            if words[window_start..index]
                .iter()
                .any(|w| NEGATIONS.contains(w))
            {
                score *= -0.5;
            }

            total += score;
            hits += 1;
        }

        if hits == 0 {
            0.0
        } else {
            (total / hits as f64).clamp(-1.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_signs() {
        let scorer = LexiconScorer::new();
        assert!(scorer.polarity("This release is GREAT!") > 0.0);
        assert!(scorer.polarity("what a terrible day") < 0.0);
        assert_eq!(scorer.polarity("the quick brown fox"), 0.0);
    }

    #[test]
    fn test_negation_flips_sign() {
        let scorer = LexiconScorer::new();
        assert!(scorer.polarity("this is not good") < 0.0);
        assert!(scorer.polarity("never bad") > 0.0);
    }

    #[test]
    fn test_result_is_clamped() {
        let scorer = LexiconScorer::new();
        let score = scorer.polarity("extremely awesome extremely perfect");
        assert!(score <= 1.0);
        assert!(score > 0.9);
    }

    #[test]
    fn test_closure_scorer() {
        let scorer = |text: &str| if text.starts_with('+') { 1.0 } else { -1.0 };
        assert_eq!(scorer.polarity("+yes"), 1.0);
        assert_eq!(PolarityScorer::polarity(&scorer, "no"), -1.0);
    }
}
