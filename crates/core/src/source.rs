use crate::envelope::Envelope;
use crate::error::SourceError;

/// A queue that delivers envelope batches with at-least-once semantics.
///
/// Envelopes that are not acknowledged become visible again and are
/// redelivered by the queue.
pub trait BatchSource: Send + Sync {
    /// Returns the name of this source, used in log fields.
    fn name(&self) -> &str;

    /// Wait for the next batch. An empty batch means nothing arrived before
    /// the source's wait time elapsed.
    fn receive(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Envelope>, SourceError>> + Send;

    /// Remove a fully processed batch from the queue.
    fn acknowledge(
        &self,
        batch: &[Envelope],
    ) -> impl std::future::Future<Output = Result<(), SourceError>> + Send;
}
