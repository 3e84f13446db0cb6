//! In-memory directory, sink and batch source. Suitable for development and
//! testing.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::directory::{IdentityDirectory, ListAuthEventsRequest, ListUsersRequest};
use crate::envelope::Envelope;
use crate::error::{DirectoryError, SourceError};
use crate::identity::{AuthHistoryEntry, Identity, parse_prefix_filter};
use crate::sink::HistorySink;
use crate::source::BatchSource;
use crate::types::{PoolId, Username};

/// A directory call observed by [`InMemoryDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    ListUsers(ListUsersRequest),
    ListAuthEvents(ListAuthEventsRequest),
}

/// Directory backed by a fixed set of identities and histories.
///
/// `list_users` applies the `sub^="..."` prefix filter to the stored
/// identities; any other filter matches nothing. Every call is recorded.
pub struct InMemoryDirectory {
    identities: Vec<Identity>,
    histories: HashMap<Username, Vec<AuthHistoryEntry>>,
    list_users_error: Option<DirectoryError>,
    auth_events_error: Option<DirectoryError>,
    calls: Mutex<Vec<DirectoryCall>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            identities: Vec::new(),
            histories: HashMap::new(),
            list_users_error: None,
            auth_events_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identities.push(identity);
        self
    }

    /// Store the history of `username`, most recent entry first.
    #[must_use]
    pub fn with_history(
        mut self,
        username: impl Into<Username>,
        entries: Vec<AuthHistoryEntry>,
    ) -> Self {
        self.histories.insert(username.into(), entries);
        self
    }

    /// Make every `list_users` call fail with `error`.
    #[must_use]
    pub fn failing_list_users(mut self, error: DirectoryError) -> Self {
        self.list_users_error = Some(error);
        self
    }

    /// Make every `list_user_auth_events` call fail with `error`.
    #[must_use]
    pub fn failing_auth_events(mut self, error: DirectoryError) -> Self {
        self.auth_events_error = Some(error);
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().expect("directory mutex poisoned").clone()
    }

    pub fn list_users_calls(&self) -> Vec<ListUsersRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DirectoryCall::ListUsers(request) => Some(request),
                DirectoryCall::ListAuthEvents(_) => None,
            })
            .collect()
    }

    pub fn auth_events_calls(&self) -> Vec<ListAuthEventsRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DirectoryCall::ListAuthEvents(request) => Some(request),
                DirectoryCall::ListUsers(_) => None,
            })
            .collect()
    }

    fn push_call(&self, call: DirectoryCall) {
        self.calls.lock().expect("directory mutex poisoned").push(call);
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityDirectory for InMemoryDirectory {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_users(&self, request: &ListUsersRequest) -> Result<Vec<Identity>, DirectoryError> {
        self.push_call(DirectoryCall::ListUsers(request.clone()));
        if let Some(err) = &self.list_users_error {
            return Err(err.clone());
        }

        let Some(prefix) = parse_prefix_filter(&request.filter) else {
            return Ok(Vec::new());
        };
        Ok(self
            .identities
            .iter()
            .filter(|identity| {
                identity
                    .subject_id
                    .as_deref()
                    .is_some_and(|sub| sub.starts_with(&prefix))
            })
            .cloned()
            .collect())
    }

    async fn list_user_auth_events(
        &self,
        request: &ListAuthEventsRequest,
    ) -> Result<Vec<AuthHistoryEntry>, DirectoryError> {
        self.push_call(DirectoryCall::ListAuthEvents(request.clone()));
        if let Some(err) = &self.auth_events_error {
            return Err(err.clone());
        }

        let limit = usize::try_from(request.max_results).unwrap_or(0);
        Ok(self
            .histories
            .get(&request.username)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self, _pool_id: &PoolId) -> Result<(), DirectoryError> {
        match &self.list_users_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// One history dump captured by [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedHistory {
    pub identity: Identity,
    pub entries: Vec<AuthHistoryEntry>,
}

/// Sink that keeps every history dump in memory.
pub struct MemorySink {
    records: Mutex<Vec<RecordedHistory>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<RecordedHistory> {
        self.records.lock().expect("sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistorySink for MemorySink {
    async fn record(&self, identity: &Identity, entries: &[AuthHistoryEntry]) {
        self.records
            .lock()
            .expect("sink mutex poisoned")
            .push(RecordedHistory {
                identity: identity.clone(),
                entries: entries.to_vec(),
            });
    }
}

/// Batch source fed from a queue of scripted receive results.
///
/// Once the script is exhausted, `receive` waits for `idle_wait` and returns
/// an empty batch, like a long poll that timed out.
pub struct InMemorySource {
    pending: Mutex<VecDeque<Result<Vec<Envelope>, SourceError>>>,
    acknowledged: Mutex<Vec<Vec<Envelope>>>,
    acknowledge_error: Option<SourceError>,
    idle_wait: Duration,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            acknowledged: Mutex::new(Vec::new()),
            acknowledge_error: None,
            idle_wait: Duration::from_millis(10),
        }
    }

    /// Queue a batch for delivery.
    pub fn push_batch(&self, batch: Vec<Envelope>) {
        self.pending
            .lock()
            .expect("source mutex poisoned")
            .push_back(Ok(batch));
    }

    /// Queue a failed receive.
    pub fn push_error(&self, error: SourceError) {
        self.pending
            .lock()
            .expect("source mutex poisoned")
            .push_back(Err(error));
    }

    /// Make every `acknowledge` call fail with `error`.
    #[must_use]
    pub fn failing_acknowledge(mut self, error: SourceError) -> Self {
        self.acknowledge_error = Some(error);
        self
    }

    #[must_use]
    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Batches acknowledged so far, in order.
    pub fn acknowledged(&self) -> Vec<Vec<Envelope>> {
        self.acknowledged
            .lock()
            .expect("source mutex poisoned")
            .clone()
    }

    /// Number of scripted results not yet received.
    pub fn pending(&self) -> usize {
        self.pending.lock().expect("source mutex poisoned").len()
    }
}

impl Default for InMemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchSource for InMemorySource {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "memory"
    }

    async fn receive(&self) -> Result<Vec<Envelope>, SourceError> {
        let next = self
            .pending
            .lock()
            .expect("source mutex poisoned")
            .pop_front();
        match next {
            Some(result) => result,
            None => {
                tokio::time::sleep(self.idle_wait).await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&self, batch: &[Envelope]) -> Result<(), SourceError> {
        if let Some(err) = &self.acknowledge_error {
            return Err(err.clone());
        }
        self.acknowledged
            .lock()
            .expect("source mutex poisoned")
            .push(batch.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubjectId;

    fn entry(event_id: &str) -> AuthHistoryEntry {
        AuthHistoryEntry::new(serde_json::json!({ "eventId": event_id }))
    }

    #[tokio::test]
    async fn directory_applies_prefix_filter() {
        let directory = InMemoryDirectory::new()
            .with_identity(Identity::new("alice").with_subject_id("u-1"))
            .with_identity(Identity::new("alicia").with_subject_id("u-10"))
            .with_identity(Identity::new("bob").with_subject_id("v-1"));

        let request =
            ListUsersRequest::by_subject_prefix(&PoolId::new("pool"), &SubjectId::new("u-1"));
        let users = directory.list_users(&request).await.unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "alicia"]);
        assert_eq!(directory.list_users_calls(), vec![request]);
    }

    #[tokio::test]
    async fn directory_caps_history() {
        let directory = InMemoryDirectory::new().with_history(
            "alice",
            (0..8).map(|i| entry(&format!("e-{i}"))).collect(),
        );
        let request = ListAuthEventsRequest {
            pool_id: PoolId::new("pool"),
            username: Username::new("alice"),
            max_results: 5,
        };
        let entries = directory.list_user_auth_events(&request).await.unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0], entry("e-0"));
    }

    #[tokio::test]
    async fn directory_unknown_user_has_no_history() {
        let directory = InMemoryDirectory::new();
        let request = ListAuthEventsRequest {
            pool_id: PoolId::new("pool"),
            username: Username::new("ghost"),
            max_results: 5,
        };
        assert!(directory.list_user_auth_events(&request).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn directory_scripted_failures() {
        let directory = InMemoryDirectory::new().failing_list_users(DirectoryError::Throttled);
        let request =
            ListUsersRequest::by_subject_prefix(&PoolId::new("pool"), &SubjectId::new("u"));
        let err = directory.list_users(&request).await.unwrap_err();
        assert_eq!(err, DirectoryError::Throttled);
        assert!(directory.health_check(&PoolId::new("pool")).await.is_err());
    }

    #[tokio::test]
    async fn sink_records_in_order() {
        let sink = MemorySink::new();
        sink.record(&Identity::new("alice"), &[entry("a")]).await;
        sink.record(&Identity::new("bob"), &[]).await;
        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identity.username.as_str(), "alice");
        assert!(records[1].entries.is_empty());
    }

    #[tokio::test]
    async fn source_replays_script_then_idles() {
        let source = InMemorySource::new().with_idle_wait(Duration::from_millis(1));
        source.push_batch(vec![Envelope::new("{}")]);
        source.push_error(SourceError::Receive("boom".into()));

        assert_eq!(source.receive().await.unwrap().len(), 1);
        assert!(source.receive().await.is_err());
        assert!(source.receive().await.unwrap().is_empty());
        assert_eq!(source.pending(), 0);
    }

    #[tokio::test]
    async fn source_records_acknowledged_batches() {
        let source = InMemorySource::new();
        let batch = vec![Envelope::new("{}").with_receipt_handle("rh-1")];
        source.acknowledge(&batch).await.unwrap();
        assert_eq!(source.acknowledged(), vec![batch]);
    }
}
