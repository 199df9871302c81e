//! AWS SDK implementation of [`OrganizationsApi`]

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_organizations::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_organizations::types;
use aws_sdk_organizations::Client;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::{Account, OrganizationsApi, Tag};
use crate::collector::ApiError;
use crate::error::BoxError;
use crate::pagination::Page;

/// SDK error reduced to its code and message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AwsError {
    code: Option<String>,
    message: String,
    #[source]
    source: BoxError,
}

impl<E, R> From<SdkError<E, R>> for AwsError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    fn from(err: SdkError<E, R>) -> Self {
        Self {
            code: err.code().map(str::to_string),
            message: DisplayErrorContext(&err).to_string(),
            source: Box::new(err),
        }
    }
}

impl ApiError for AwsError {
    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Organizations client backed by the AWS SDK.
#[derive(Debug, Clone)]
pub struct SdkOrganizations {
    client: Client,
}

impl SdkOrganizations {
    /// Create a client from loaded SDK configuration.
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl OrganizationsApi for SdkOrganizations {
    type Error = AwsError;

    async fn list_accounts(&self, next_token: Option<String>) -> Result<Page<Account>, AwsError> {
        let resp = self
            .client
            .list_accounts()
            .set_next_token(next_token)
            .send()
            .await?;

        let accounts = resp.accounts().iter().map(convert_account).collect();
        Ok(Page::new(accounts, resp.next_token().map(str::to_string)))
    }

    async fn list_tags(
        &self,
        account_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<Tag>, AwsError> {
        let resp = self
            .client
            .list_tags_for_resource()
            .resource_id(account_id)
            .set_next_token(next_token)
            .send()
            .await?;

        let tags = resp
            .tags()
            .iter()
            .map(|t| Tag::new(t.key(), t.value()))
            .collect();
        Ok(Page::new(tags, resp.next_token().map(str::to_string)))
    }
}

#[allow(deprecated)]
fn convert_account(account: &types::Account) -> Account {
    Account {
        id: account.id().unwrap_or_default().to_string(),
        arn: account.arn().unwrap_or_default().to_string(),
        name: account.name().unwrap_or_default().to_string(),
        email: account.email().unwrap_or_default().to_string(),
        status: account.status().map(|s| s.as_str().to_string()),
        joined_method: account.joined_method().map(|m| m.as_str().to_string()),
        joined_timestamp: account
            .joined_timestamp()
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())),
    }
}
