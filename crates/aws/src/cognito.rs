//! Cognito user pool as the identity directory.

use authtrail_core::directory::{IdentityDirectory, ListAuthEventsRequest, ListUsersRequest};
use authtrail_core::identity::{AuthHistoryEntry, Identity, SUBJECT_ATTRIBUTE};
use authtrail_core::{DirectoryError, PoolId};
use aws_sdk_cognitoidentityprovider::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::operation::admin_list_user_auth_events::builders::AdminListUserAuthEventsFluentBuilder;
use aws_sdk_cognitoidentityprovider::operation::list_users::ListUsersOutput;
use aws_sdk_cognitoidentityprovider::operation::list_users::builders::ListUsersFluentBuilder;
use aws_sdk_cognitoidentityprovider::primitives::{DateTime, DateTimeFormat};
use aws_sdk_cognitoidentityprovider::types::{AuthEventType, UserType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, error, info, instrument};

use crate::auth::build_sdk_config;
use crate::config::AwsBaseConfig;
use crate::error::classify_sdk_error;

/// Configuration for the Cognito directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CognitoConfig {
    /// Shared AWS configuration (region, role ARN, endpoint URL).
    #[serde(flatten)]
    pub aws: AwsBaseConfig,
}

impl CognitoConfig {
    /// Create a new `CognitoConfig` with the given AWS region.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            aws: AwsBaseConfig::new(region),
        }
    }

    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.aws.endpoint_url = Some(endpoint_url.into());
        self
    }

    #[must_use]
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.aws.role_arn = Some(role_arn.into());
        self
    }
}

/// [`IdentityDirectory`] backed by a Cognito user pool.
///
/// The wrapped SDK client is a cheap handle; one instance is built at startup
/// and reused for every batch.
pub struct CognitoDirectory {
    config: CognitoConfig,
    client: aws_sdk_cognitoidentityprovider::Client,
}

impl std::fmt::Debug for CognitoDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoDirectory")
            .field("config", &self.config)
            .field("client", &"<CognitoIdentityProviderClient>")
            .finish()
    }
}

impl CognitoDirectory {
    /// Create a `CognitoDirectory` by building an AWS SDK client.
    pub async fn new(config: CognitoConfig) -> Self {
        let sdk_config = build_sdk_config(&config.aws).await;
        let client = aws_sdk_cognitoidentityprovider::Client::new(&sdk_config);
        Self { config, client }
    }

    /// Create a `CognitoDirectory` with a pre-built client.
    pub fn with_client(
        config: CognitoConfig,
        client: aws_sdk_cognitoidentityprovider::Client,
    ) -> Self {
        Self { config, client }
    }
}

impl CognitoDirectory {
    /// One page of a `ListUsers` scan.
    fn list_users_call(
        &self,
        request: &ListUsersRequest,
        pagination_token: Option<String>,
    ) -> ListUsersFluentBuilder {
        self.client
            .list_users()
            .user_pool_id(request.pool_id.as_str())
            .set_attributes_to_get(Some(request.attributes_to_get.clone()))
            .filter(&request.filter)
            .set_pagination_token(pagination_token)
    }

    fn auth_events_call(
        &self,
        request: &ListAuthEventsRequest,
    ) -> AdminListUserAuthEventsFluentBuilder {
        self.client
            .admin_list_user_auth_events()
            .user_pool_id(request.pool_id.as_str())
            .username(request.username.as_str())
            .max_results(request.max_results)
    }
}

impl IdentityDirectory for CognitoDirectory {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "cognito"
    }

    /// Lists every matching user, following pagination tokens until the
    /// directory reports no further pages.
    #[instrument(skip_all, fields(pool_id = %request.pool_id, filter = %request.filter))]
    async fn list_users(&self, request: &ListUsersRequest) -> Result<Vec<Identity>, DirectoryError> {
        let identities = collect_user_pages(|token| async move {
            self.list_users_call(request, token)
                .send()
                .await
                .map_err(|e| directory_error("ListUsers", &e))
        })
        .await?;

        debug!(found = identities.len(), "users listed");
        Ok(identities)
    }

    #[instrument(skip_all, fields(pool_id = %request.pool_id, username = %request.username))]
    async fn list_user_auth_events(
        &self,
        request: &ListAuthEventsRequest,
    ) -> Result<Vec<AuthHistoryEntry>, DirectoryError> {
        let output = self
            .auth_events_call(request)
            .send()
            .await
            .map_err(|e| directory_error("AdminListUserAuthEvents", &e))?;

        let entries: Vec<AuthHistoryEntry> =
            output.auth_events().iter().map(auth_event_to_entry).collect();
        debug!(entries = entries.len(), "auth events fetched");
        Ok(entries)
    }

    #[instrument(skip(self), fields(directory = "cognito"))]
    async fn health_check(&self, pool_id: &PoolId) -> Result<(), DirectoryError> {
        debug!("performing Cognito health check");
        self.client
            .list_users()
            .user_pool_id(pool_id.as_str())
            .limit(1)
            .send()
            .await
            .map_err(|e| directory_error("ListUsers", &e))?;
        info!("Cognito health check passed");
        Ok(())
    }
}

fn directory_error<E, R>(operation: &str, err: &SdkError<E, R>) -> DirectoryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    error!(operation, error = %message, "Cognito request failed");
    match err {
        SdkError::TimeoutError(_) => DirectoryError::Timeout,
        SdkError::DispatchFailure(_) => DirectoryError::Unavailable(message),
        _ => classify_sdk_error(err.as_service_error().and_then(|e| e.code()), &message),
    }
}

/// Drive a paginated `ListUsers` scan.
///
/// `fetch_page` is called with `None` first, then with each returned
/// pagination token until a page comes back without one.
pub(crate) async fn collect_user_pages<F, Fut>(
    mut fetch_page: F,
) -> Result<Vec<Identity>, DirectoryError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListUsersOutput, DirectoryError>>,
{
    let mut identities = Vec::new();
    let mut pagination_token: Option<String> = None;

    loop {
        let output = fetch_page(pagination_token.take()).await?;
        for user in output.users() {
            identities.push(user_to_identity(user)?);
        }

        match output.pagination_token() {
            Some(token) => {
                debug!(found = identities.len(), "fetching next page of users");
                pagination_token = Some(token.to_owned());
            }
            None => return Ok(identities),
        }
    }
}

/// Convert a listed user into an [`Identity`].
///
/// A user without a username cannot be queried for history, so it is
/// reported as an invalid directory response.
pub(crate) fn user_to_identity(user: &UserType) -> Result<Identity, DirectoryError> {
    let username = user.username().ok_or_else(|| {
        DirectoryError::InvalidResponse("listed user has no username".to_owned())
    })?;

    let subject = user
        .attributes()
        .iter()
        .find(|attr| attr.name() == SUBJECT_ATTRIBUTE)
        .and_then(|attr| attr.value());

    let identity = Identity::new(username);
    Ok(match subject {
        Some(sub) => identity.with_subject_id(sub),
        None => identity,
    })
}

/// Render an SDK auth event as a JSON object, omitting absent fields.
pub(crate) fn auth_event_to_entry(event: &AuthEventType) -> AuthHistoryEntry {
    let mut entry = Map::new();
    insert_opt(&mut entry, "eventId", event.event_id());
    insert_opt(&mut entry, "eventType", event.event_type().map(|t| t.as_str()));
    insert_opt(
        &mut entry,
        "creationDate",
        event.creation_date().and_then(format_date).as_deref(),
    );
    insert_opt(
        &mut entry,
        "eventResponse",
        event.event_response().map(|r| r.as_str()),
    );

    if let Some(risk) = event.event_risk() {
        let mut value = Map::new();
        insert_opt(&mut value, "riskDecision", risk.risk_decision().map(|d| d.as_str()));
        insert_opt(&mut value, "riskLevel", risk.risk_level().map(|l| l.as_str()));
        if let Some(detected) = risk.compromised_credentials_detected() {
            value.insert("compromisedCredentialsDetected".to_owned(), json!(detected));
        }
        entry.insert("eventRisk".to_owned(), Value::Object(value));
    }

    let challenges: Vec<Value> = event
        .challenge_responses()
        .iter()
        .map(|c| {
            let mut value = Map::new();
            insert_opt(&mut value, "challengeName", c.challenge_name().map(|n| n.as_str()));
            insert_opt(
                &mut value,
                "challengeResponse",
                c.challenge_response().map(|r| r.as_str()),
            );
            Value::Object(value)
        })
        .collect();
    if !challenges.is_empty() {
        entry.insert("challengeResponses".to_owned(), Value::Array(challenges));
    }

    if let Some(ctx) = event.event_context_data() {
        let mut value = Map::new();
        insert_opt(&mut value, "ipAddress", ctx.ip_address());
        insert_opt(&mut value, "deviceName", ctx.device_name());
        insert_opt(&mut value, "timezone", ctx.timezone());
        insert_opt(&mut value, "city", ctx.city());
        insert_opt(&mut value, "country", ctx.country());
        entry.insert("eventContextData".to_owned(), Value::Object(value));
    }

    if let Some(feedback) = event.event_feedback() {
        let mut value = Map::new();
        value.insert(
            "feedbackValue".to_owned(),
            json!(feedback.feedback_value().as_str()),
        );
        value.insert("provider".to_owned(), json!(feedback.provider()));
        insert_opt(
            &mut value,
            "feedbackDate",
            feedback.feedback_date().and_then(format_date).as_deref(),
        );
        entry.insert("eventFeedback".to_owned(), Value::Object(value));
    }

    AuthHistoryEntry::new(Value::Object(entry))
}

fn insert_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(v) = value {
        map.insert(key.to_owned(), json!(v));
    }
}

fn format_date(date: &DateTime) -> Option<String> {
    date.fmt(DateTimeFormat::DateTime).ok()
}
