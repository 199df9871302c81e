//! Unit tests for the resource envelope

use inventory_crawler::{CollectError, DescribeContext, Resource};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
struct BucketDescription {
    versioning: bool,
    tags: Vec<String>,
}

#[test]
fn test_full_envelope_serialization() {
    let resource = Resource::new("us-east-1")
        .with_arn("arn:aws:s3:::logs")
        .with_id("logs")
        .with_name("logs")
        .with_description(&BucketDescription {
            versioning: true,
            tags: vec!["team:core".to_string()],
        })
        .unwrap();

    let value = serde_json::to_value(&resource).unwrap();
    assert_eq!(
        value,
        json!({
            "Region": "us-east-1",
            "ARN": "arn:aws:s3:::logs",
            "ID": "logs",
            "Name": "logs",
            "Description": {"versioning": true, "tags": ["team:core"]}
        })
    );
}

#[test]
fn test_deserialize_with_missing_optionals() {
    let resource: Resource =
        serde_json::from_str(r#"{"Region": "eu-central-1", "Name": "queue"}"#).unwrap();

    assert_eq!(resource.region, "eu-central-1");
    assert_eq!(resource.name.as_deref(), Some("queue"));
    assert!(resource.arn.is_none());
    assert!(resource.id.is_none());
    assert!(resource.description.is_null());
    assert!(resource.is_identifiable());
}

#[test]
fn test_unserializable_description_is_describe_error() {
    let mut map = std::collections::HashMap::new();
    map.insert(vec![1u8], "non-string key");

    let result = Resource::new("us-east-1").with_id("x").with_description(&map);
    assert!(matches!(result, Err(CollectError::Describe(_))));
}

#[test]
fn test_describe_context_serializes() {
    let ctx = DescribeContext::new("us-gov-east-1", "123456789012");
    assert_eq!(
        serde_json::to_value(&ctx).unwrap(),
        json!({"region": "us-gov-east-1", "account_id": "123456789012", "partition": "aws-us-gov"})
    );
}
