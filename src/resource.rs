//! Resource envelope and describe context
//!
//! Every collected entity is normalized into a [`Resource`]; the serialized
//! field names are the contract downstream consumers read.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollectError;

/// Uniform output record for one discovered entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Region the resource was discovered in
    #[serde(rename = "Region")]
    pub region: String,

    /// Amazon Resource Name
    #[serde(rename = "ARN", default, skip_serializing_if = "Option::is_none")]
    pub arn: Option<String>,

    /// Provider identifier
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Service-specific payload
    #[serde(rename = "Description", default)]
    pub description: Value,
}

impl Resource {
    /// Create an envelope with only the region set.
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            arn: None,
            id: None,
            name: None,
            description: Value::Null,
        }
    }

    /// Set the ARN.
    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    /// Set the ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Serialize `description` into the payload.
    ///
    /// # Errors
    /// Returns [`CollectError::Describe`] if the payload cannot be serialized.
    pub fn with_description<D: Serialize>(mut self, description: &D) -> Result<Self, CollectError> {
        self.description = serde_json::to_value(description).map_err(CollectError::describe)?;
        Ok(self)
    }

    /// Whether at least one of ARN, ID or name is set and non-empty.
    pub fn is_identifiable(&self) -> bool {
        self.identity().is_some()
    }

    /// Best available identity: ARN, then ID, then name.
    pub fn identity(&self) -> Option<&str> {
        [&self.arn, &self.id, &self.name]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .find(|value| !value.is_empty())
    }
}

/// Ambient values an enrichment step reads; the collector never interprets
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribeContext {
    /// Region being collected
    pub region: String,
    /// Account being collected
    pub account_id: String,
    /// ARN partition (`aws`, `aws-cn`, `aws-us-gov`)
    pub partition: String,
}

impl DescribeContext {
    /// Create a context, deriving the partition from the region.
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        let region = region.into();
        let partition = partition_for_region(&region).to_string();
        Self {
            region,
            account_id: account_id.into(),
            partition,
        }
    }

    /// Regional ARN in this context's partition, region and account.
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account_id, resource
        )
    }

    /// ARN for a global service (empty region field).
    pub fn global_arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}::{}:{}",
            self.partition, service, self.account_id, resource
        )
    }
}

/// ARN partition for a region name.
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else {
        "aws"
    }
}
