use tokio_util::sync::CancellationToken;

/// Marks a batch as still wanted. Cloning shares the same underlying flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: CancellationToken,
    generation: u64,
}

impl CancelToken {
    pub fn new(generation: u64) -> Self {
        Self {
            inner: CancellationToken::new(),
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the token has been cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}
