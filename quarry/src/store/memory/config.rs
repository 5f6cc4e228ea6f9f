use std::time::Duration;

/// Settings of an [InMemoryStore](crate::store::memory::InMemoryStore).
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    sequence_start: i64,
    lock_timeout: Duration,
}

impl InMemoryStoreConfig {
    pub fn new() -> InMemoryStoreConfig {
        InMemoryStoreConfig::default()
    }

    /// First identity handed out by each entity sequence.
    pub fn sequence_start(mut self, start: i64) -> Self {
        self.sequence_start = start;
        self
    }

    /// How long a write waits for the store's write lock before failing
    /// with [OperationTimeout](crate::errors::ErrorKind::OperationTimeout).
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn get_sequence_start(&self) -> i64 {
        self.sequence_start
    }

    pub fn get_lock_timeout(&self) -> Duration {
        self.lock_timeout
    }
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        InMemoryStoreConfig {
            sequence_start: 1,
            lock_timeout: Duration::from_secs(5),
        }
    }
}
