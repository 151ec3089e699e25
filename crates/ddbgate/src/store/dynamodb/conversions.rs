//! Conversions between the gateway's attribute model and the SDK's.
//!
//! Pure functions, testable without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue as SdkValue, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use ddbgate_core::{AttributeValue, Item, KeyAttribute, ScalarType, TableDescriptor};

use crate::error::{StoreError, StoreResult};

/// SDK representation of an item.
pub type SdkItem = HashMap<String, SdkValue>;

// ============================================================================
// Values
// ============================================================================

pub fn into_sdk(value: AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s),
        AttributeValue::N(n) => SdkValue::N(n),
        AttributeValue::Bool(b) => SdkValue::Bool(b),
        AttributeValue::B(bytes) => SdkValue::B(Blob::new(bytes)),
        AttributeValue::Ss(values) => SdkValue::Ss(values),
        AttributeValue::Ns(values) => SdkValue::Ns(values),
        AttributeValue::L(values) => SdkValue::L(values.into_iter().map(into_sdk).collect()),
        AttributeValue::M(map) => SdkValue::M(into_sdk_item(map)),
        AttributeValue::Null => SdkValue::Null(true),
    }
}

pub fn into_sdk_item(item: Item) -> SdkItem {
    item.into_iter().map(|(k, v)| (k, into_sdk(v))).collect()
}

/// Converts an SDK value. Binary sets have no counterpart and come back as a
/// list of binaries.
pub fn from_sdk(value: SdkValue) -> StoreResult<AttributeValue> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s),
        SdkValue::N(n) => AttributeValue::N(n),
        SdkValue::Bool(b) => AttributeValue::Bool(b),
        SdkValue::B(blob) => AttributeValue::B(blob.into_inner()),
        SdkValue::Ss(values) => AttributeValue::Ss(values),
        SdkValue::Ns(values) => AttributeValue::Ns(values),
        SdkValue::Bs(values) => AttributeValue::L(
            values
                .into_iter()
                .map(|blob| AttributeValue::B(blob.into_inner()))
                .collect(),
        ),
        SdkValue::L(values) => AttributeValue::L(
            values
                .into_iter()
                .map(from_sdk)
                .collect::<StoreResult<Vec<_>>>()?,
        ),
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        SdkValue::Null(_) => AttributeValue::Null,
        other => {
            return Err(StoreError::InvalidData(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

pub fn from_sdk_item(item: SdkItem) -> StoreResult<Item> {
    item.into_iter()
        .map(|(k, v)| from_sdk(v).map(|v| (k, v)))
        .collect()
}

// ============================================================================
// Key schema
// ============================================================================

pub fn to_scalar_type(attribute_type: ScalarType) -> ScalarAttributeType {
    match attribute_type {
        ScalarType::S => ScalarAttributeType::S,
        ScalarType::N => ScalarAttributeType::N,
        ScalarType::B => ScalarAttributeType::B,
    }
}

/// Key schema and attribute definitions for a descriptor, partition key first.
pub fn key_schema(
    descriptor: &TableDescriptor,
) -> StoreResult<(Vec<KeySchemaElement>, Vec<AttributeDefinition>)> {
    let mut keys = vec![(&descriptor.partition_key, KeyType::Hash)];
    if let Some(sk) = &descriptor.sort_key {
        keys.push((sk, KeyType::Range));
    }

    let mut schema = Vec::with_capacity(keys.len());
    let mut definitions = Vec::with_capacity(keys.len());
    for (key, key_type) in keys {
        schema.push(key_schema_element(key, key_type)?);
        definitions.push(attribute_definition(key)?);
    }
    Ok((schema, definitions))
}

fn key_schema_element(key: &KeyAttribute, key_type: KeyType) -> StoreResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(&key.name)
        .key_type(key_type)
        .build()
        .map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn attribute_definition(key: &KeyAttribute) -> StoreResult<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(&key.name)
        .attribute_type(to_scalar_type(key.attribute_type))
        .build()
        .map_err(|e| StoreError::InvalidData(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_round_trip() {
        let values = vec![
            AttributeValue::S("tom".to_string()),
            AttributeValue::N("32".to_string()),
            AttributeValue::Bool(true),
            AttributeValue::B(vec![0, 1, 2]),
            AttributeValue::Null,
        ];
        for value in values {
            assert_eq!(from_sdk(into_sdk(value.clone())).unwrap(), value);
        }
    }

    #[test]
    fn test_nested_item_round_trip() {
        let mut inner = HashMap::new();
        inner.insert("k1".to_string(), AttributeValue::S("vv1".to_string()));

        let mut item = Item::new();
        item.insert("PK".to_string(), AttributeValue::S("USER#1".to_string()));
        item.insert(
            "Tags".to_string(),
            AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]),
        );
        item.insert(
            "Mixed".to_string(),
            AttributeValue::L(vec![
                AttributeValue::N("1".to_string()),
                AttributeValue::S("x".to_string()),
            ]),
        );
        item.insert("Map".to_string(), AttributeValue::M(inner));

        let sdk = into_sdk_item(item.clone());
        assert_eq!(sdk["PK"], SdkValue::S("USER#1".to_string()));
        assert_eq!(from_sdk_item(sdk).unwrap(), item);
    }

    #[test]
    fn test_binary_set_reads_as_list() {
        let value = SdkValue::Bs(vec![Blob::new(vec![1]), Blob::new(vec![2])]);
        assert_eq!(
            from_sdk(value).unwrap(),
            AttributeValue::L(vec![AttributeValue::B(vec![1]), AttributeValue::B(vec![2])])
        );
    }

    #[test]
    fn test_key_schema_with_sort_key() {
        let descriptor = TableDescriptor::new("user_logs", KeyAttribute::string("PK"))
            .unwrap()
            .with_sort_key(KeyAttribute::number("Seq"))
            .unwrap();

        let (schema, definitions) = key_schema(&descriptor).unwrap();

        assert_eq!(schema.len(), 2);
        assert_eq!(schema[0].attribute_name(), "PK");
        assert_eq!(schema[0].key_type(), &KeyType::Hash);
        assert_eq!(schema[1].key_type(), &KeyType::Range);
        assert_eq!(definitions[1].attribute_type(), &ScalarAttributeType::N);
    }
}
