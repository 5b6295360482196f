//! イベント分類器
//!
//! 1件のツイートを {リツイートか, 感情, 影響度, 重複排除キー} に分類する。
//! 純粋かつ全域的で、失敗しない。

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::sentiment::{LexiconScorer, PolarityScorer};
use crate::api::tweet::{Tweet, TweetId};

/// 感情の符号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// 極性値から判定。0以下・NaNは否定（保守的な既定値）
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.0 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Sentiment::Positive => '+',
            Sentiment::Negative => '-',
        }
    }
}

/// 分類結果（保存されない派生値）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_repost: bool,
    pub sentiment: Sentiment,
    /// 受信時点の影響度（フォロワー数）。後から補正しない
    pub influence: u64,
    /// リツイートなら元投稿ID、それ以外は自身のID
    pub dedup_key: TweetId,
}

/// 分類器
#[derive(Clone)]
pub struct Classifier {
    scorer: Arc<dyn PolarityScorer>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier").finish_non_exhaustive()
    }
}

impl Classifier {
    pub fn new(scorer: Arc<dyn PolarityScorer>) -> Self {
        Self { scorer }
    }

    pub fn classify(&self, tweet: &Tweet) -> Classification {
        let polarity = self.scorer.polarity(&tweet.text);
        let sentiment = Sentiment::from_polarity(polarity);
        if !polarity.is_finite() && sentiment == Sentiment::Negative {
            tracing::trace!(
                tweet_id = %tweet.id,
                polarity = polarity,
                "Non-finite polarity classified as negative"
            );
        }

        let (is_repost, dedup_key) = match &tweet.retweeted_id {
            Some(original) => (true, original.clone()),
            None => (false, tweet.id.clone()),
        };

        Classification {
            is_repost,
            sentiment,
            influence: tweet.followers,
            dedup_key,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(LexiconScorer::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(polarity: f64) -> Classifier {
        Classifier::new(Arc::new(move |_: &str| polarity))
    }

    #[test]
    fn test_original_uses_own_id() {
        let tweet = Tweet::original("42", "alice", "hello").with_followers(300);
        let result = fixed(0.5).classify(&tweet);

        assert!(!result.is_repost);
        assert_eq!(result.dedup_key, TweetId::from("42"));
        assert_eq!(result.influence, 300);
        assert_eq!(result.sentiment, Sentiment::Positive);
    }

    #[test]
    fn test_retweet_uses_original_id() {
        let tweet = Tweet::retweet("43", "bob", "42", "RT hello");
        let result = fixed(0.5).classify(&tweet);

        assert!(result.is_repost);
        assert_eq!(result.dedup_key, TweetId::from("42"));
    }

    #[test]
    fn test_zero_and_nan_are_negative() {
        let tweet = Tweet::original("1", "a", "meh");
        assert_eq!(fixed(0.0).classify(&tweet).sentiment, Sentiment::Negative);
        assert_eq!(fixed(f64::NAN).classify(&tweet).sentiment, Sentiment::Negative);
        assert_eq!(fixed(-0.1).classify(&tweet).sentiment, Sentiment::Negative);
        assert_eq!(
            fixed(f64::INFINITY).classify(&tweet).sentiment,
            Sentiment::Positive
        );
    }

    /// trace出力をバッファに集めて返す
    fn captured_trace(polarity: f64) -> String {
        #[derive(Clone, Default)]
        struct Capture(Arc<parking_lot::Mutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            fixed(polarity).classify(&Tweet::original("1", "a", "edge"));
        });

        let bytes = capture.0.lock().clone();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_non_finite_negative_is_traced_only_when_negative() {
        assert!(captured_trace(f64::NAN).contains("classified as negative"));
        assert!(captured_trace(f64::NEG_INFINITY).contains("classified as negative"));
        assert!(!captured_trace(f64::INFINITY).contains("classified as negative"));
        assert!(!captured_trace(-0.5).contains("classified as negative"));
    }

    #[test]
    fn test_default_classifier_uses_lexicon() {
        let classifier = Classifier::default();
        let positive = Tweet::original("1", "a", "what a great launch");
        assert_eq!(classifier.classify(&positive).sentiment, Sentiment::Positive);
    }
}
