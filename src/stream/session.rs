//! Request-credit consumption of a scan stream.
//!
//! The producer task pulls the underlying stream only while the consumer
//! has outstanding credit, so an idle session buffers at most the channel
//! capacity. Cancellation is explicit and also triggered by drop.

use futures_core::Stream;
use futures_util::{pin_mut, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::{error::Result, executor::Executor, logging::LOG_TARGET};

/// Consumer handle of a spawned scan.
pub struct ScanSession<T> {
    items: flume::Receiver<Result<T>>,
    credits: flume::Sender<usize>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> ScanSession<T> {
    /// Spawns a producer task draining `stream` into a channel of capacity
    /// `buffer`, gated by the credits the consumer grants.
    pub fn spawn<E, S>(executor: &E, stream: S, buffer: usize) -> Self
    where
        E: Executor,
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        let (item_tx, item_rx) = flume::bounded(buffer.max(1));
        let (credit_tx, credit_rx) = flume::unbounded::<usize>();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        executor.spawn(async move {
            pin_mut!(stream);
            let cancelled = token.cancelled().fuse();
            pin_mut!(cancelled);
            let mut credit: usize = 0;
            loop {
                if credit == 0 {
                    let granted = credit_rx.recv_async().fuse();
                    pin_mut!(granted);
                    futures_util::select! {
                        granted = granted => match granted {
                            Ok(n) => credit = credit.saturating_add(n),
                            // Consumer gone.
                            Err(_) => break,
                        },
                        _ = cancelled.as_mut() => break,
                    }
                    continue;
                }
                // Top up without blocking while credit remains.
                while let Ok(n) = credit_rx.try_recv() {
                    credit = credit.saturating_add(n);
                }
                let item = {
                    let next = stream.next().fuse();
                    pin_mut!(next);
                    futures_util::select! {
                        item = next => item,
                        _ = cancelled.as_mut() => break,
                    }
                };
                match item {
                    Some(item) => {
                        let terminal = item.is_err();
                        if item_tx.send_async(item).await.is_err() {
                            break;
                        }
                        if terminal {
                            break;
                        }
                        credit -= 1;
                    }
                    None => break,
                }
            }
            tracing::debug!(target: LOG_TARGET, "scan session producer finished");
        });

        ScanSession {
            items: item_rx,
            credits: credit_tx,
            cancel,
        }
    }

    /// Grants the producer credit for `n` more items.
    pub fn request(&self, n: usize) {
        let _ = self.credits.send(n);
    }

    /// Receives the next item. Returns `None` once the stream is exhausted,
    /// a terminal error was already delivered, or the session was
    /// cancelled. Suspends while no credit is outstanding.
    pub async fn next(&self) -> Option<Result<T>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let item = self.items.recv_async().fuse();
        pin_mut!(item);
        let cancelled = self.cancel.cancelled().fuse();
        pin_mut!(cancelled);
        futures_util::select! {
            item = item => item.ok(),
            _ = cancelled => None,
        }
    }

    /// Cancels the session; the producer stops at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for ScanSession<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
