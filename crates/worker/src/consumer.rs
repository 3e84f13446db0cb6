//! Queue consumer loop driving the batch resolver.

use std::time::Duration;

use authtrail_core::{BatchResolver, BatchSource, Envelope, ErrorKind, IdentityDirectory, SourceError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What happened during one poll of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing arrived before the source's wait time elapsed.
    Idle,
    /// The batch was processed and removed from the queue.
    Processed { records: usize },
    /// The batch failed and was left on the queue for redelivery.
    /// `transient` marks failures a plain redelivery can clear.
    Rejected {
        records: usize,
        kind: ErrorKind,
        transient: bool,
    },
    /// The batch was processed but could not be removed, so it will be
    /// delivered (and logged) again.
    AcknowledgeFailed { records: usize },
    /// The source could not be read.
    ReceiveFailed,
}

impl PollOutcome {
    /// Whether the loop should back off before polling again.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::AcknowledgeFailed { .. } | Self::ReceiveFailed
        )
    }
}

/// Pulls batches from a [`BatchSource`] and feeds them to a
/// [`BatchResolver`].
///
/// A batch is acknowledged only when the resolver succeeds for all of it.
/// Failed batches are never acknowledged; the queue makes them visible again
/// once their visibility timeout expires.
pub struct Consumer<S, D> {
    source: S,
    resolver: BatchResolver<D>,
    error_backoff: Duration,
}

impl<S: BatchSource, D: IdentityDirectory> Consumer<S, D> {
    pub fn new(source: S, resolver: BatchResolver<D>, error_backoff: Duration) -> Self {
        Self {
            source,
            resolver,
            error_backoff,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn resolver(&self) -> &BatchResolver<D> {
        &self.resolver
    }

    /// Receive and handle a single batch.
    pub async fn poll_once(&self) -> PollOutcome {
        let received = self.source.receive().await;
        self.handle(received).await
    }

    /// Run until a shutdown signal arrives or every sender is dropped.
    ///
    /// Shutdown is only observed while waiting for a batch or backing off, so
    /// a batch that has been received is always processed to completion.
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(source = self.source.name(), "consumer started");

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("consumer received shutdown signal");
                    break;
                }
                received = self.source.receive() => received,
            };

            let outcome = self.handle(received).await;
            if outcome.is_failure() {
                debug!(backoff_ms = self.error_backoff.as_millis(), "backing off");
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        info!("consumer received shutdown signal");
                        break;
                    }
                    () = tokio::time::sleep(self.error_backoff) => {}
                }
            }
        }

        info!("consumer stopped");
    }

    async fn handle(&self, received: Result<Vec<Envelope>, SourceError>) -> PollOutcome {
        let batch = match received {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, source = self.source.name(), "failed to receive batch");
                return PollOutcome::ReceiveFailed;
            }
        };

        if batch.is_empty() {
            debug!("no messages received");
            return PollOutcome::Idle;
        }

        let records = batch.len();
        if let Err(e) = self.resolver.process(&batch).await {
            warn!(
                records,
                kind = %e.kind(),
                transient = e.is_transient(),
                redeliver = e.should_redeliver(),
                "batch left on the queue for redelivery"
            );
            return PollOutcome::Rejected {
                records,
                kind: e.kind(),
                transient: e.is_transient(),
            };
        }

        match self.source.acknowledge(&batch).await {
            Ok(()) => {
                info!(records, "batch processed");
                PollOutcome::Processed { records }
            }
            Err(e) => {
                error!(error = %e, records, "processed batch could not be acknowledged");
                PollOutcome::AcknowledgeFailed { records }
            }
        }
    }
}
