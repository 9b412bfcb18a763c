//! Scanner tunables.

/// Knobs shared by every scan a [`crate::scanner::Scanner`] opens.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Default per-shard fetch granularity for specs built through
    /// [`crate::scanner::Scanner::spec`].
    pub batch_size: usize,
    /// Channel capacity of a session spawned by
    /// [`crate::scanner::Scanner::iterate_session`].
    pub session_buffer: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            batch_size: 256,
            session_buffer: 64,
        }
    }
}

impl ScanOptions {
    /// Sets the default batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the session channel capacity.
    pub fn session_buffer(mut self, session_buffer: usize) -> Self {
        self.session_buffer = session_buffer;
        self
    }
}
