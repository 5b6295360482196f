//! statuses/filter ストリーミングフィード
//!
//! チャンク転送されるNDJSONを1行ずつ解釈し、`FeedSignal` に変換して配信する。

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use std::time::Duration;

use super::oauth::OAuthSigner;
use super::TwitterConfig;
use crate::api::feed::{
    ConnectError, Feed, FeedConnection, FeedSignal, FeedSink, StopSignal, TopicFilter,
};
use crate::api::tweet::{Tweet, TweetId};

#[derive(Debug, Deserialize)]
struct RawUser {
    id_str: String,
    #[serde(default)]
    screen_name: String,
    #[serde(default)]
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct RawExtendedTweet {
    full_text: String,
}

#[derive(Debug, Deserialize)]
struct RawRetweeted {
    id_str: String,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    id_str: String,
    #[serde(default)]
    text: String,
    extended_tweet: Option<RawExtendedTweet>,
    user: RawUser,
    retweeted_status: Option<RawRetweeted>,
    timestamp_ms: Option<String>,
}

impl From<RawStatus> for Tweet {
    fn from(raw: RawStatus) -> Self {
        let received_at = raw
            .timestamp_ms
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
            .unwrap_or_else(chrono::Utc::now);

        Tweet {
            id: TweetId(raw.id_str),
            text: raw.extended_tweet.map(|e| e.full_text).unwrap_or(raw.text),
            author_id: raw.user.id_str,
            author_name: raw.user.screen_name,
            followers: raw.user.followers_count,
            retweeted_id: raw.retweeted_status.map(|r| TweetId(r.id_str)),
            received_at,
        }
    }
}

/// ストリームの1行を信号に変換する
///
/// キープアライブの空行、limit通知、削除通知など集計対象外のメッセージは `None`。
pub fn parse_stream_line(line: &str) -> Option<FeedSignal> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("⚠️ [TWITTER_STREAM] Unparseable line skipped: {}", e);
            return None;
        }
    };

    if let Some(warning) = value.get("warning") {
        let message = warning
            .get("message")
            .or_else(|| warning.get("code"))
            .and_then(|m| m.as_str())
            .unwrap_or("stall warning")
            .to_string();
        return Some(FeedSignal::Stall { message });
    }

    if let Some(disconnect) = value.get("disconnect") {
        let reason = disconnect
            .get("reason")
            .and_then(|r| r.as_str())
            .unwrap_or("disconnected by remote")
            .to_string();
        return Some(FeedSignal::RemoteDisconnect { reason });
    }

    if let Some(limit) = value.get("limit") {
        tracing::debug!("📉 [TWITTER_STREAM] Limit notice: {}", limit);
        return None;
    }

    if value.get("id_str").is_none() || value.get("user").is_none() {
        return None;
    }

    match serde_json::from_value::<RawStatus>(value) {
        Ok(raw) => Some(FeedSignal::Event(raw.into())),
        Err(e) => {
            tracing::warn!("⚠️ [TWITTER_STREAM] Status skipped: {}", e);
            None
        }
    }
}

/// statuses/filter フィード
#[derive(Debug)]
pub struct TwitterStreamFeed {
    signer: OAuthSigner,
    config: TwitterConfig,
    http_client: reqwest::Client,
}

impl TwitterStreamFeed {
    pub fn new(signer: OAuthSigner, config: TwitterConfig) -> Result<Self, ConnectError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("twitlive/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            signer,
            config,
            http_client,
        })
    }
}

async fn pump(
    response: reqwest::Response,
    stall_timeout: Duration,
    sink: FeedSink,
    mut stop: StopSignal,
) {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            _ = stop.stopped() => break,
            chunk = tokio::time::timeout(stall_timeout, stream.next()) => match chunk {
                Err(_) => {
                    sink.stall(format!("no data for {} seconds", stall_timeout.as_secs())).await;
                    break;
                }
                Ok(None) => {
                    sink.remote_disconnect("stream closed by remote").await;
                    break;
                }
                Ok(Some(Err(e))) => {
                    sink.remote_disconnect(e.to_string()).await;
                    break;
                }
                Ok(Some(Ok(bytes))) => {
                    buffer.extend_from_slice(&bytes);
                    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=pos).collect();
                        if let Some(signal) = parse_stream_line(&String::from_utf8_lossy(&line)) {
                            if !sink.send(signal).await {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
    tracing::debug!("🔌 [TWITTER_STREAM] Pump finished");
}

#[async_trait]
impl Feed for TwitterStreamFeed {
    async fn connect(
        &self,
        filter: &TopicFilter,
        sink: FeedSink,
    ) -> Result<FeedConnection, ConnectError> {
        let params = [("track", filter.track.as_str()), ("stall_warnings", "true")];
        let authorization = self
            .signer
            .authorization_header("POST", &self.config.stream_url, &params);

        tracing::info!("🌐 [TWITTER_STREAM] Connecting to {} ({})", self.config.stream_url, filter);

        let response = self
            .http_client
            .post(&self.config.stream_url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_to_error(response).await);
        }

        let (connection, stop) = FeedConnection::new(format!("twitter:{}", filter.track));
        tokio::spawn(pump(
            response,
            Duration::from_secs(self.config.stall_timeout_secs),
            sink,
            stop,
        ));
        Ok(connection)
    }

    fn name(&self) -> &str {
        "twitter"
    }
}

/// 失敗レスポンスを接続エラーに分類
pub(crate) async fn status_to_error(response: reqwest::Response) -> ConnectError {
    let status = response.status().as_u16();
    let retry_after_seconds = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60);
    let message = response.text().await.unwrap_or_default();

    match status {
        401 | 403 => ConnectError::Auth(format!("HTTP {}: {}", status, message)),
        420 | 429 => ConnectError::RateLimited {
            retry_after_seconds,
        },
        _ => ConnectError::Rejected { status, message },
    }
}
