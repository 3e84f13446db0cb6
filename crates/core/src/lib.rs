//! Core types and the batch resolver for authtrail.
//!
//! A batch of queued CloudTrail authentication events is reduced to subject
//! identifiers, each subject is resolved to its directory identities, and the
//! recent authentication history of every identity is handed to a
//! [`HistorySink`].

pub mod directory;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod memory;
pub mod resolver;
pub mod sink;
pub mod source;
pub mod subject;
pub mod types;

pub use directory::{IdentityDirectory, ListAuthEventsRequest, ListUsersRequest};
pub use envelope::{BatchResponse, Envelope, SqsEvent};
pub use error::{DirectoryError, ErrorKind, ResolverError, SourceError};
pub use identity::{AuthHistoryEntry, Identity, SUBJECT_ATTRIBUTE, prefix_filter};
pub use resolver::{BatchResolver, DEFAULT_MAX_HISTORY, ResolverConfig, SubjectMode};
pub use sink::{HistorySink, TracingSink};
pub use source::BatchSource;
pub use subject::{PayloadError, extract_subject};
pub use types::{PoolId, SubjectId, Username};
