//! AWS backends for authtrail.
//!
//! - **Cognito** ([`CognitoDirectory`]) resolves subjects to users and serves
//!   their authentication history
//! - **SQS** ([`SqsBatchSource`]) delivers CloudTrail events in batches
//!
//! Both share a common [`AwsBaseConfig`](config::AwsBaseConfig) for region,
//! endpoint override, operation timeout and optional STS assume-role
//! credentials.

pub mod auth;
pub mod cognito;
pub mod config;
pub mod error;
pub mod sqs;

pub use cognito::{CognitoConfig, CognitoDirectory};
pub use config::AwsBaseConfig;
pub use error::{AwsError, classify_sdk_error};
pub use sqs::{SqsBatchSource, SqsSourceConfig};
