use crate::error::DirectoryError;
use crate::identity::{AuthHistoryEntry, Identity, SUBJECT_ATTRIBUTE, prefix_filter};
use crate::types::{PoolId, SubjectId, Username};

/// Parameters of a directory user listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersRequest {
    pub pool_id: PoolId,
    /// Attributes the directory should return for each identity.
    pub attributes_to_get: Vec<String>,
    /// Directory filter expression.
    pub filter: String,
}

impl ListUsersRequest {
    /// Request every identity whose subject starts with `subject`, returning
    /// only the subject attribute.
    pub fn by_subject_prefix(pool_id: &PoolId, subject: &SubjectId) -> Self {
        Self {
            pool_id: pool_id.clone(),
            attributes_to_get: vec![SUBJECT_ATTRIBUTE.to_owned()],
            filter: prefix_filter(subject),
        }
    }
}

/// Parameters of an authentication history lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAuthEventsRequest {
    pub pool_id: PoolId,
    pub username: Username,
    /// Upper bound on the number of entries returned.
    pub max_results: i32,
}

/// An identity directory that resolves subjects and serves per-identity
/// authentication history.
///
/// Uses native `async fn` in traits, so implementations are used through
/// generics rather than trait objects.
pub trait IdentityDirectory: Send + Sync {
    /// Returns the name of this directory backend, used in log fields.
    fn name(&self) -> &str;

    /// List the identities matching the request filter.
    fn list_users(
        &self,
        request: &ListUsersRequest,
    ) -> impl std::future::Future<Output = Result<Vec<Identity>, DirectoryError>> + Send;

    /// Fetch the most recent authentication events of one identity.
    fn list_user_auth_events(
        &self,
        request: &ListAuthEventsRequest,
    ) -> impl std::future::Future<Output = Result<Vec<AuthHistoryEntry>, DirectoryError>> + Send;

    /// Verify the pool is reachable with the current credentials.
    fn health_check(
        &self,
        pool_id: &PoolId,
    ) -> impl std::future::Future<Output = Result<(), DirectoryError>> + Send;
}
