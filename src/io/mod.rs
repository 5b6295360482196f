//! ファイル入出力ユーティリティ
//!
//! ツイートのキャプチャ（NDJSON）の読み書きを提供する。

pub mod ndjson;

pub use ndjson::{parse_ndjson_str, read_tweets, write_ndjson, NdjsonError, ParsedLines};
