//! Per-session debounce slot
//!
//! Holds at most one pending sync. Arming the slot cancels whatever was
//! pending, so a burst of edits collapses into the last one.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct DebounceSlot {
    pending: Option<CancellationToken>,
}

impl DebounceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the pending sync (if any) and arm a new one
    pub fn arm(&mut self) -> CancellationToken {
        self.cancel();
        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        token
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }

    /// A sync is armed and has not been superseded or cancelled
    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|t| !t.is_cancelled())
    }
}

/// Sleep for `delay` unless cancelled first; `true` means the delay ran out
pub async fn wait(token: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(delay) => !token.is_cancelled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_cancels_previous() {
        let mut slot = DebounceSlot::new();
        let first = slot.arm();
        let second = slot.arm();
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(slot.is_armed());

        slot.cancel();
        assert!(second.is_cancelled());
        assert!(!slot.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_elapses_or_cancels() {
        let token = CancellationToken::new();
        assert!(wait(&token, Duration::from_millis(50)).await);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });
        assert!(!wait(&token, Duration::from_millis(500)).await);
    }
}
