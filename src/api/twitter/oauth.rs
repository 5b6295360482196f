//! OAuth 1.0a リクエスト署名（HMAC-SHA1）
//!
//! ストリーミングAPIとトレンドAPIの両方で使う `Authorization` ヘッダーを生成する。

use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// 認証情報（4つの不透明なトークン）
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub access_token_secret: String,
}

/// 認証情報の検証エラー
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Missing credential: {field}")]
pub struct MissingCredential {
    pub field: &'static str,
}

impl Credentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// 4つすべてが設定されているか確認
    pub fn validate(&self) -> Result<(), MissingCredential> {
        let fields = [
            ("consumer_key", &self.consumer_key),
            ("consumer_secret", &self.consumer_secret),
            ("access_token", &self.access_token),
            ("access_token_secret", &self.access_token_secret),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(MissingCredential { field }),
            None => Ok(()),
        }
    }
}

// シークレットはログに出さない
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |value: &str| if value.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &mask(&self.consumer_secret))
            .field("access_token", &mask(&self.access_token))
            .field("access_token_secret", &mask(&self.access_token_secret))
            .finish()
    }
}

/// RFC 3986 パーセントエンコード
fn percent_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// OAuth 1.0a 署名器
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: Credentials,
}

impl OAuthSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// 新しいnonceと現在時刻で `Authorization` ヘッダー値を生成
    pub fn authorization_header(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        self.authorization_header_with(method, url, params, &nonce, &timestamp)
    }

    /// nonceとタイムスタンプを指定してヘッダー値を生成
    pub fn authorization_header_with(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        nonce: &str,
        timestamp: &str,
    ) -> String {
        let mut oauth_params = vec![
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut all_params: Vec<(&str, &str)> = params.to_vec();
        all_params.extend(oauth_params.iter().copied());
        let base = signature_base_string(method, url, &all_params);
        let signature = self.sign(&base);

        oauth_params.push(("oauth_signature", signature.as_str()));
        oauth_params.sort();

        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    /// 署名ベース文字列をHMAC-SHA1で署名しBase64で返す
    pub fn sign(&self, base_string: &str) -> String {
        let key = format!(
            "{}&{}",
            percent_encode(&self.credentials.consumer_secret),
            percent_encode(&self.credentials.access_token_secret)
        );
        let mut mac =
            HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
        mac.update(base_string.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// 署名ベース文字列 `METHOD&url&params` を作成
pub fn signature_base_string(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        percent_encode(url),
        percent_encode(&param_string)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_signer() -> OAuthSigner {
        OAuthSigner::new(Credentials::new(
            "xvz1evFS4wEEPTGEFPHBog",
            "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw",
            "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE",
        ))
    }

    #[test]
    fn test_reference_signature() {
        let header = reference_signer().authorization_header_with(
            "POST",
            "https://api.twitter.com/1.1/statuses/update.json",
            &[
                ("include_entities", "true"),
                ("status", "Hello Ladies + Gentlemen, a signed OAuth request!"),
            ],
            "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg",
            "1318622958",
        );

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
    }

    #[test]
    fn test_base_string_sorts_and_encodes() {
        let base = signature_base_string(
            "post",
            "https://stream.twitter.com/1.1/statuses/filter.json",
            &[("track", "rust lang"), ("stall_warnings", "true")],
        );
        assert_eq!(
            base,
            "POST&https%3A%2F%2Fstream.twitter.com%2F1.1%2Fstatuses%2Ffilter.json&stall_warnings%3Dtrue%26track%3Drust%2520lang"
        );
    }

    #[test]
    fn test_signature_is_deterministic() {
        let signer = reference_signer();
        assert_eq!(signer.sign("data"), signer.sign("data"));
        assert_ne!(signer.sign("data"), signer.sign("other"));
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let mut credentials = Credentials::new("a", "b", "c", "d");
        assert!(credentials.validate().is_ok());

        credentials.access_token = "  ".to_string();
        assert_eq!(
            credentials.validate(),
            Err(MissingCredential {
                field: "access_token"
            })
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::new("key", "secret", "token", ""));
        assert!(debug.contains("key"));
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("token\""));
        assert!(debug.contains("<unset>"));
    }
}
