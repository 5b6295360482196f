//! trends/place からのトレンド取得

use serde::Deserialize;
use std::time::Duration;

use super::oauth::OAuthSigner;
use super::stream::status_to_error;
use super::TwitterConfig;
use crate::api::feed::ConnectError;
use crate::session::TopicTarget;

/// トレンド取得エラー
#[derive(thiserror::Error, Debug)]
pub enum TrendError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Trend response parsing failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No trends returned for WOEID {woeid}")]
    Empty { woeid: u64 },
}

#[derive(Debug, Deserialize)]
struct RawTrend {
    name: String,
    tweet_volume: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPlaceTrends {
    trends: Vec<RawTrend>,
}

/// trends/place レスポンスを順序を保ったまま `TopicTarget` に変換
pub fn parse_trends(body: &str) -> Result<Vec<TopicTarget>, serde_json::Error> {
    let places: Vec<RawPlaceTrends> = serde_json::from_str(body)?;
    Ok(places
        .into_iter()
        .flat_map(|place| place.trends)
        .map(|trend| TopicTarget {
            name: trend.name,
            expected_volume: trend.tweet_volume,
        })
        .collect())
}

/// トレンドAPIクライアント
#[derive(Debug)]
pub struct TrendClient {
    signer: OAuthSigner,
    config: TwitterConfig,
    http_client: reqwest::Client,
}

impl TrendClient {
    pub fn new(signer: OAuthSigner, config: TwitterConfig) -> Result<Self, ConnectError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            signer,
            config,
            http_client,
        })
    }

    /// 指定地域（WOEID）のトレンドを取得
    pub async fn fetch_trends(&self, woeid: u64) -> Result<Vec<TopicTarget>, TrendError> {
        let id = woeid.to_string();
        let params = [("id", id.as_str())];
        let authorization = self
            .signer
            .authorization_header("GET", &self.config.trends_url, &params);

        tracing::info!("📈 [TRENDS] Fetching trends for WOEID {}", woeid);

        let response = self
            .http_client
            .get(&self.config.trends_url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .query(&params)
            .send()
            .await
            .map_err(ConnectError::from)?;

        if !response.status().is_success() {
            return Err(status_to_error(response).await.into());
        }

        let body = response.text().await.map_err(ConnectError::from)?;
        let targets = parse_trends(&body)?;
        if targets.is_empty() {
            return Err(TrendError::Empty { woeid });
        }

        tracing::info!("📈 [TRENDS] {} trends received", targets.len());
        Ok(targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trends_keeps_order_and_null_volume() {
        let body = r##"[{"trends":[
            {"name":"#RustConf","url":"x","tweet_volume":12000},
            {"name":"Ferris","url":"y","tweet_volume":null}
        ],"as_of":"2024-01-01T00:00:00Z","locations":[{"name":"Worldwide","woeid":1}]}]"##;

        let targets = parse_trends(body).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "#RustConf");
        assert_eq!(targets[0].expected_volume, Some(12000));
        assert_eq!(targets[1].expected_volume, None);
    }

    #[test]
    fn test_parse_trends_rejects_garbage() {
        assert!(parse_trends("{\"errors\":[]}").is_err());
    }
}
