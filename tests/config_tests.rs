//! 設定ファイルと環境変数の結合テスト

use tempfile::tempdir;
use twitlive::config::{ConfigManager, SessionMode, ENV_ACCESS_TOKEN, ENV_CONSUMER_KEY};
use twitlive::session::ExecutionMode;

// 環境変数を書き換えるため、このファイルのテストは1つだけにする
#[test]
fn test_file_then_environment_overrides() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[credentials]
consumer_key = "file-key"
consumer_secret = "file-secret"
access_token = "file-token"
access_token_secret = "file-token-secret"

[session]
window_secs = 15
mode = "concurrent"
max_concurrent = 4

[log]
level = "debug"
"#,
    )
    .unwrap();

    std::env::set_var(ENV_CONSUMER_KEY, "env-key");
    std::env::set_var(ENV_ACCESS_TOKEN, "   ");

    let manager = ConfigManager::with_path(&path);
    let config = manager.load_effective_config().unwrap();

    std::env::remove_var(ENV_CONSUMER_KEY);
    std::env::remove_var(ENV_ACCESS_TOKEN);

    assert_eq!(config.credentials.consumer_key, "env-key");
    assert_eq!(config.credentials.consumer_secret, "file-secret");
    // 空白だけの値は上書きしない
    assert_eq!(config.credentials.access_token, "file-token");
    assert!(config.credentials.validate().is_ok());

    assert_eq!(config.session.mode, SessionMode::Concurrent);
    assert_eq!(
        config.session.execution_mode(),
        ExecutionMode::Concurrent { max_sessions: 4 }
    );
    assert_eq!(
        config.session.window_config().duration,
        std::time::Duration::from_secs(15)
    );
    assert_eq!(config.log.level, "debug");

    // シークレットは Debug 出力に含まれない
    let debug = format!("{:?}", config.credentials);
    assert!(!debug.contains("file-secret"));
}
