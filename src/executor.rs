//! Pluggable task spawning for asynchronous scan sessions.

use std::future::Future;

/// Spawns the producer task of a scan session.
pub trait Executor {
    /// Runs `future` to completion in the background.
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

#[cfg(any(feature = "tokio", test))]
pub mod tokio {
    //! [`Executor`] backed by a tokio runtime handle.

    use std::future::Future;

    use super::Executor;

    /// Spawns onto an existing tokio runtime.
    pub struct TokioExecutor {
        handle: tokio::runtime::Handle,
    }

    impl TokioExecutor {
        /// Uses the runtime of the calling context.
        ///
        /// # Panics
        ///
        /// Panics when called outside a tokio runtime.
        pub fn current() -> Self {
            Self {
                handle: tokio::runtime::Handle::current(),
            }
        }

        /// Uses the given runtime handle.
        pub fn new(handle: tokio::runtime::Handle) -> Self {
            Self { handle }
        }
    }

    impl Executor for TokioExecutor {
        fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            self.handle.spawn(future);
        }
    }
}
