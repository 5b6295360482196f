//! 協調的キャンセル信号

use tokio::sync::watch;

/// キャンセル要求を出す側
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// キャンセル要求を監視する側
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelSignal { rx })
    }

    /// キャンセルを要求する（同期コンテキストからも呼べる）
    pub fn cancel(&self) {
        if !self.tx.send_replace(true) {
            tracing::info!("🛑 [CANCEL] Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// 決してキャンセルされない信号
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        // 送信側を破棄しても値は false のまま
        drop(tx);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// キャンセルされるまで待機。ハンドルが破棄された場合は永久に待つ
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
