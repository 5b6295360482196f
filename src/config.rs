//! アプリケーション設定管理モジュール
//!
//! XDGディレクトリ上の TOML ファイルと `TWITLIVE_*` 環境変数から設定を読み込む。
//! コア（集計・セッション）は設定を読まず、ここで組み立てた値を受け取るだけ。

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::twitter::{Credentials, TwitterConfig};
use crate::session::{ExecutionMode, WindowConfig, DEFAULT_WINDOW_SECS};

/// 設定値の読み込み・検証エラー
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// セッションの実行方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Sequential,
    Concurrent,
}

/// セッション設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 1ターゲットあたりの計測時間（秒）
    pub window_secs: u64,
    pub mode: SessionMode,
    /// concurrent モードでの同時セッション上限
    pub max_concurrent: usize,
    pub drain_timeout_secs: u64,
    pub channel_capacity: usize,
    /// 受信ツイートを逐次表示
    pub live_echo: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            mode: SessionMode::Sequential,
            max_concurrent: 3,
            drain_timeout_secs: 10,
            channel_capacity: 1024,
            live_echo: false,
        }
    }
}

impl SessionConfig {
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            duration: Duration::from_secs(self.window_secs),
            drain_timeout: Duration::from_secs(self.drain_timeout_secs),
            channel_capacity: self.channel_capacity,
            live_echo: self.live_echo,
        }
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        match self.mode {
            SessionMode::Sequential => ExecutionMode::Sequential,
            SessionMode::Concurrent => ExecutionMode::Concurrent {
                max_sessions: self.max_concurrent.max(1),
            },
        }
    }
}

/// ログ設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// ログレベル (trace/debug/info/warn/error)
    pub level: String,
    /// カスタムログディレクトリ（Noneの場合はXDGデフォルト使用）
    pub log_dir: Option<PathBuf>,
    /// ファイル出力有効化
    pub enable_file_logging: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            enable_file_logging: false,
        }
    }
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Twitter API 認証情報
    #[serde(default)]
    pub credentials: Credentials,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub twitter: TwitterConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// 認証情報を上書きする環境変数
pub const ENV_CONSUMER_KEY: &str = "TWITLIVE_CONSUMER_KEY";
pub const ENV_CONSUMER_SECRET: &str = "TWITLIVE_CONSUMER_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "TWITLIVE_ACCESS_TOKEN";
pub const ENV_ACCESS_TOKEN_SECRET: &str = "TWITLIVE_ACCESS_TOKEN_SECRET";
pub const ENV_WINDOW_SECS: &str = "TWITLIVE_WINDOW_SECS";

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// プロセス環境変数で上書き
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// 任意の参照関数で上書き（空文字列は無視）
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let credentials = &mut self.credentials;
        for (key, slot) in [
            (ENV_CONSUMER_KEY, &mut credentials.consumer_key),
            (ENV_CONSUMER_SECRET, &mut credentials.consumer_secret),
            (ENV_ACCESS_TOKEN, &mut credentials.access_token),
            (ENV_ACCESS_TOKEN_SECRET, &mut credentials.access_token_secret),
        ] {
            if let Some(value) = lookup(key) {
                debug!("🔑 Credential overridden by {}", key);
                *slot = value;
            }
        }

        if let Some(value) = lookup(ENV_WINDOW_SECS) {
            self.session.window_secs =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_WINDOW_SECS.to_string(),
                        value: value.clone(),
                    })?;
        }

        Ok(())
    }
}

/// 設定管理マネージャー
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// XDG設定ディレクトリを使う設定マネージャーを作成
    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        // 設定ディレクトリを作成（存在しない場合）
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        Ok(Self { config_path })
    }

    /// 明示的なパスを使う
    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "sifyfy", "twitlive").context("Failed to get project directories")
    }

    /// XDGディレクトリに基づく設定ファイルパスを取得
    fn get_config_path() -> Result<PathBuf> {
        let config_file = Self::project_dirs()?.config_dir().join("config.toml");
        debug!("Config file path: {}", config_file.display());
        Ok(config_file)
    }

    /// 既定のログディレクトリ
    pub fn default_log_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_local_dir().join("logs"))
    }

    /// 設定を読み込み（ファイルが無ければ既定値）。環境変数の上書きは行わない
    pub fn load_config(&self) -> Result<AppConfig> {
        if !self.config_path.exists() {
            info!(
                "Config file not found, using default settings: {}",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let config_content = fs::read_to_string(&self.config_path).with_context(|| {
            format!("Failed to read config file: {}", self.config_path.display())
        })?;

        let config = AppConfig::from_toml_str(&config_content).with_context(|| {
            format!(
                "Failed to parse config file: {}",
                self.config_path.display()
            )
        })?;

        info!(
            "✅ Configuration loaded from: {}",
            self.config_path.display()
        );

        Ok(config)
    }

    /// ファイルを読み込み、環境変数の上書きを適用
    pub fn load_effective_config(&self) -> Result<AppConfig> {
        let mut config = self.load_config()?;
        config
            .apply_env_overrides()
            .context("Invalid environment override")?;
        Ok(config)
    }

    /// 有効な設定を読み込む。失敗した場合は警告を出してデフォルト設定を使用
    pub fn load_or_default(&self) -> AppConfig {
        self.load_effective_config().unwrap_or_else(|e| {
            warn!("⚠️ 設定読み込みエラー、デフォルト設定を使用: {:#}", e);
            let mut config = AppConfig::default();
            if let Err(e) = config.apply_env_overrides() {
                warn!("⚠️ 環境変数の上書きを無視しました: {}", e);
            }
            config
        })
    }

    /// 設定を保存
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        let config_content = config
            .to_toml_string()
            .context("Failed to serialize config")?;

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(&self.config_path, config_content).with_context(|| {
            format!(
                "Failed to write config file: {}",
                self.config_path.display()
            )
        })?;

        info!("💾 Configuration saved to: {}", self.config_path.display());

        Ok(())
    }

    /// 設定ファイルパスを取得
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}
