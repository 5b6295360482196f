pub mod cancel; // 協調的キャンセル
pub mod orchestrator; // 複数セッションの実行
pub mod target;
pub mod window; // 1セッションの状態機械

pub use cancel::{CancelHandle, CancelSignal};
pub use orchestrator::*;
pub use target::{TargetSelection, TopicTarget};
pub use window::{WindowConfig, WindowController, WindowState, DEFAULT_WINDOW_SECS};

use crate::analytics::AggregatorError;
use crate::api::ConnectError;

/// セッション実行のエラー
///
/// 縮退完了はエラーではなくスナップショットの `Completion::Degraded` で表す。
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("Connect failed: {0}")]
    Connect(#[from] ConnectError),

    #[error("Aggregator error: {0}")]
    Aggregator(#[from] AggregatorError),

    #[error("Session cancelled before connecting")]
    Cancelled,

    #[error("Window controller already used (state: {state:?})")]
    ControllerUsed { state: WindowState },
}
