//! Organization account crawler
//!
//! Lists every account in an organization, fetches each account's tags
//! concurrently and emits one [`Resource`] per account.

#[cfg(feature = "aws")]
pub mod aws;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collector::{ApiError, CollectSummary, Collector, WorkItem, WorkerContext};
use crate::error::CollectError;
use crate::pagination::Page;
use crate::resource::Resource;
use crate::sink::ResourceSink;

/// Member account of an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Account {
    /// 12-digit account ID
    pub id: String,
    /// Account ARN
    pub arn: String,
    /// Friendly name
    pub name: String,
    /// Root email address
    pub email: String,
    /// `ACTIVE`, `SUSPENDED`, ...
    pub status: Option<String>,
    /// `INVITED` or `CREATED`
    pub joined_method: Option<String>,
    /// When the account joined the organization
    pub joined_timestamp: Option<DateTime<Utc>>,
}

impl Account {
    /// Account with the required fields set.
    pub fn new(
        id: impl Into<String>,
        arn: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            arn: arn.into(),
            name: name.into(),
            email: email.into(),
            status: None,
            joined_method: None,
            joined_timestamp: None,
        }
    }
}

impl WorkItem for Account {
    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key
    pub key: String,
    /// Tag value
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Organizations calls used by the crawler.
#[async_trait]
pub trait OrganizationsApi: Send + Sync + 'static {
    /// Provider error type
    type Error: ApiError;

    /// One page of member accounts.
    async fn list_accounts(&self, next_token: Option<String>)
        -> Result<Page<Account>, Self::Error>;

    /// One page of tags attached to an account.
    async fn list_tags(
        &self,
        account_id: &str,
        next_token: Option<String>,
    ) -> Result<Page<Tag>, Self::Error>;
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccountDescription<'a> {
    account: &'a Account,
    tags: BTreeMap<String, String>,
}

/// Crawl every account of the organization into `sink`.
///
/// # Errors
/// A failed account listing is terminal. Tag lookups that fail are
/// reported per account in the summary.
pub async fn crawl_accounts<A, S>(
    collector: &Collector,
    api: Arc<A>,
    sink: &mut S,
) -> Result<CollectSummary, CollectError>
where
    A: OrganizationsApi,
    S: ResourceSink + ?Sized,
{
    let worker_api = Arc::clone(&api);
    let list_api: &A = api.as_ref();

    collector
        .crawl(
            move |cursor| list_api.list_accounts(cursor),
            move |ctx, account: Account| describe_account(ctx, Arc::clone(&worker_api), account),
            sink,
        )
        .await
}

/// Fetch an account's tags and map it to a resource.
pub async fn describe_account<A: OrganizationsApi>(
    ctx: WorkerContext,
    api: Arc<A>,
    account: Account,
) -> Result<Resource, CollectError> {
    let executor = ctx.executor();
    let api: &A = api.as_ref();
    let account_id = account.id.as_str();

    let tags = ctx
        .paginator()
        .list_all(move |cursor| async move {
            executor
                .execute(move || api.list_tags(account_id, cursor.clone()))
                .await
        })
        .await?;

    account_resource(&ctx.describe().region, &account, tags)
}

/// Map an account and its tags to a resource envelope.
pub fn account_resource(
    region: &str,
    account: &Account,
    tags: Vec<Tag>,
) -> Result<Resource, CollectError> {
    let description = AccountDescription {
        account,
        tags: tags.into_iter().map(|t| (t.key, t.value)).collect(),
    };
    Resource::new(region)
        .with_arn(&account.arn)
        .with_id(&account.id)
        .with_name(&account.name)
        .with_description(&description)
}
