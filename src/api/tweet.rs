//! ストリームで配信されるツイート（イベント）のモデル

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 投稿ID
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TweetId(pub String);

impl From<&str> for TweetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TweetId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 配信された1件のツイート
///
/// 受信後は変更されない。`retweeted_id` はリツイートの場合のみ存在する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: TweetId,
    pub text: String,
    pub author_id: String,
    #[serde(default)]
    pub author_name: String,
    /// 受信時点のフォロワー数
    #[serde(default)]
    pub followers: u64,
    /// リツイート元の投稿ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_id: Option<TweetId>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl Tweet {
    /// 通常ツイートを作成
    pub fn original(
        id: impl Into<TweetId>,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let author_id = author_id.into();
        Self {
            id: id.into(),
            text: text.into(),
            author_name: author_id.clone(),
            author_id,
            followers: 0,
            retweeted_id: None,
            received_at: Utc::now(),
        }
    }

    /// リツイートを作成
    pub fn retweet(
        id: impl Into<TweetId>,
        author_id: impl Into<String>,
        original_id: impl Into<TweetId>,
        text: impl Into<String>,
    ) -> Self {
        let mut tweet = Self::original(id, author_id, text);
        tweet.retweeted_id = Some(original_id.into());
        tweet
    }

    pub fn with_followers(mut self, followers: u64) -> Self {
        self.followers = followers;
        self
    }

    pub fn is_retweet(&self) -> bool {
        self.retweeted_id.is_some()
    }

    /// ログ出力用の本文プレビュー
    pub fn preview(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}
