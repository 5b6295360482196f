pub mod channel_feed; // プロセス内フィード（組み込み・テスト用）
pub mod feed; // フィード抽象化
pub mod replay_feed; // NDJSONキャプチャ再生
pub mod tweet;
pub mod twitter; // statuses/filter ストリーム + トレンド

pub use channel_feed::{ChannelFeed, ChannelFeedProducer, Refusal, ScriptStep};
pub use feed::{ConnectError, Feed, FeedConnection, FeedSignal, FeedSink, StopSignal, TopicFilter};
pub use replay_feed::{ReplayConfig, ReplayFeed};
pub use tweet::{Tweet, TweetId};
