//! Cancellation for long-running [`crate::FileSystem::watch`] calls.

/// A token passed into [`crate::FileSystem::watch`]; dropping the paired
/// [`CancelHandle`] (or calling [`CancelHandle::cancel`]) tells the watch
/// loop to shut down within the bounded time target described in §5
/// (< 100 ms).
#[derive(Clone)]
pub struct CancelToken {
    rx: crossbeam_channel::Receiver<()>,
}

/// The caller-held half of a [`CancelToken`] pair.
pub struct CancelHandle {
    tx: crossbeam_channel::Sender<()>,
}

impl CancelToken {
    /// Construct a fresh cancel token and its handle.
    pub fn new() -> (CancelHandle, CancelToken) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        (CancelHandle { tx }, CancelToken { rx })
    }

    /// A token that can never be cancelled, for callers that don't need to
    /// stop a watch early.
    pub fn never() -> CancelToken {
        // A closed receiver with no corresponding sender never yields, and
        // `is_cancelled` correctly reports false since `try_recv` returns
        // `Empty`, not `Disconnected`, only once the sender is gone — so we
        // keep a sender alive for the lifetime of the token by leaking it
        // into the token itself via a channel that is never signalled.
        let (_tx, rx) = crossbeam_channel::bounded(0);
        std::mem::forget(_tx);
        CancelToken { rx }
    }

    /// Non-blocking check: has the handle signalled cancellation?
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.rx.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }

    /// The underlying receiver, for use in a [`crossbeam_channel::Select`].
    pub fn receiver(&self) -> &crossbeam_channel::Receiver<()> {
        &self.rx
    }
}

impl CancelHandle {
    /// Signal cancellation. Idempotent.
    pub fn cancel(self) {
        drop(self.tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let (_handle, token) = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancel_marks_token_cancelled() {
        let (handle, token) = CancelToken::new();
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn dropping_handle_also_cancels() {
        let (handle, token) = CancelToken::new();
        drop(handle);
        assert!(token.is_cancelled());
    }

    #[test]
    fn never_token_stays_uncancelled() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cloned_token_observes_same_cancellation() {
        let (handle, token) = CancelToken::new();
        let cloned = token.clone();
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(cloned.is_cancelled());
    }
}
