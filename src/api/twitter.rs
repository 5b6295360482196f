pub mod oauth;
pub mod stream;
pub mod trends;

use serde::{Deserialize, Serialize};

pub use oauth::{Credentials, MissingCredential, OAuthSigner};
pub use stream::{parse_stream_line, TwitterStreamFeed};
pub use trends::{TrendClient, TrendError};

/// Twitter API 接続設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub stream_url: String,
    pub trends_url: String,
    pub connect_timeout_secs: u64,
    /// この秒数データが届かなければ停滞とみなす
    pub stall_timeout_secs: u64,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            stream_url: "https://stream.twitter.com/1.1/statuses/filter.json".to_string(),
            trends_url: "https://api.twitter.com/1.1/trends/place.json".to_string(),
            connect_timeout_secs: 15,
            stall_timeout_secs: 90,
        }
    }
}
