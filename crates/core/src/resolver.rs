//! The batch resolver: envelopes → subjects → identities → auth history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::directory::{IdentityDirectory, ListAuthEventsRequest, ListUsersRequest};
use crate::envelope::{BatchResponse, Envelope};
use crate::error::ResolverError;
use crate::sink::HistorySink;
use crate::subject::extract_subject;
use crate::types::{PoolId, SubjectId};

/// Default number of history entries fetched per identity.
pub const DEFAULT_MAX_HISTORY: i32 = 5;

/// Largest page the directory serves for an auth event listing.
pub const MAX_HISTORY_LIMIT: i32 = 60;

/// Which subjects of a batch are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectMode {
    /// Every envelope's subject, in batch order.
    #[default]
    All,
    /// Only the subject of the last envelope. Earlier envelopes are still
    /// validated. Matches the legacy handler, which overwrote its subject on
    /// every iteration.
    LastOnly,
}

impl SubjectMode {
    /// Configuration spelling of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::LastOnly => "last_only",
        }
    }
}

/// Settings of a [`BatchResolver`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// User pool every directory call targets.
    pub pool_id: PoolId,
    /// History entries fetched per identity.
    pub max_history: i32,
    pub subject_mode: SubjectMode,
}

impl ResolverConfig {
    pub fn new(pool_id: impl Into<PoolId>) -> Self {
        Self {
            pool_id: pool_id.into(),
            max_history: DEFAULT_MAX_HISTORY,
            subject_mode: SubjectMode::default(),
        }
    }

    #[must_use]
    pub fn with_max_history(mut self, max_history: i32) -> Self {
        self.max_history = max_history;
        self
    }

    #[must_use]
    pub fn with_subject_mode(mut self, subject_mode: SubjectMode) -> Self {
        self.subject_mode = subject_mode;
        self
    }

    /// Reject a blank pool id or a history cap outside `1..=60`.
    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.pool_id.trim().is_empty() {
            return Err(ResolverError::Configuration(
                "pool id must be a non-empty string".to_owned(),
            ));
        }
        if !(1..=MAX_HISTORY_LIMIT).contains(&self.max_history) {
            return Err(ResolverError::Configuration(format!(
                "max_history must be between 1 and {MAX_HISTORY_LIMIT}, got {}",
                self.max_history
            )));
        }
        Ok(())
    }
}

/// Resolves the subjects of a batch and records their recent authentication
/// history.
///
/// A batch either succeeds as a whole or fails as a whole: the first error
/// aborts processing and is returned so the caller can redeliver the batch.
/// All envelopes are decoded before the first directory call.
pub struct BatchResolver<D> {
    config: ResolverConfig,
    directory: D,
    sink: Arc<dyn HistorySink>,
}

impl<D: IdentityDirectory> BatchResolver<D> {
    /// Create a resolver after validating `config`.
    pub fn new(
        config: ResolverConfig,
        directory: D,
        sink: Arc<dyn HistorySink>,
    ) -> Result<Self, ResolverError> {
        config.validate()?;
        Ok(Self {
            config,
            directory,
            sink,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Process one batch.
    #[instrument(skip_all, fields(records = batch.len(), directory = self.directory.name()))]
    pub async fn process(&self, batch: &[Envelope]) -> Result<BatchResponse, ResolverError> {
        match self.process_batch(batch).await {
            Ok(()) => Ok(BatchResponse::ok()),
            Err(e) => {
                error!(
                    error = %e,
                    kind = %e.kind(),
                    pool_id = %self.config.pool_id,
                    "batch processing failed"
                );
                Err(e)
            }
        }
    }

    async fn process_batch(&self, batch: &[Envelope]) -> Result<(), ResolverError> {
        let subjects = self.select_subjects(batch)?;
        debug!(subjects = subjects.len(), mode = ?self.config.subject_mode, "subjects extracted");

        for subject in &subjects {
            self.resolve_subject(subject).await?;
        }
        Ok(())
    }

    fn select_subjects(&self, batch: &[Envelope]) -> Result<Vec<SubjectId>, ResolverError> {
        if batch.is_empty() {
            return Err(ResolverError::EmptyBatch);
        }

        let mut subjects = batch
            .iter()
            .enumerate()
            .map(|(index, envelope)| {
                extract_subject(&envelope.body).map_err(|source| {
                    ResolverError::MalformedPayload {
                        index,
                        message_id: envelope.message_id.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.config.subject_mode == SubjectMode::LastOnly {
            subjects = subjects.pop().into_iter().collect();
        }
        Ok(subjects)
    }

    async fn resolve_subject(&self, subject: &SubjectId) -> Result<(), ResolverError> {
        let request = ListUsersRequest::by_subject_prefix(&self.config.pool_id, subject);
        debug!(subject_id = %subject, filter = %request.filter, "listing identities");
        let identities = self.directory.list_users(&request).await?;

        if identities.is_empty() {
            info!(subject_id = %subject, "no identities match subject");
            return Ok(());
        }

        for identity in &identities {
            let request = ListAuthEventsRequest {
                pool_id: self.config.pool_id.clone(),
                username: identity.username.clone(),
                max_results: self.config.max_history,
            };
            let entries = self.directory.list_user_auth_events(&request).await?;
            self.sink.record(identity, &entries).await;
        }
        Ok(())
    }
}
