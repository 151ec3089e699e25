//! Primary key validation and extraction.
//!
//! Pure functions over marshaled items. All functions are sync and have no
//! side effects.

use crate::codec;
use crate::error::{CoreError, Result};
use crate::table::{KeyAttribute, ScalarType, TableDescriptor};
use crate::value::{AttributeValue, Item, NativeValue};

/// Checks that `item` carries every key attribute of `descriptor` with the
/// declared scalar type.
pub fn validate_item_keys(descriptor: &TableDescriptor, item: &Item) -> Result<()> {
    check_key(descriptor, &descriptor.partition_key, item.get(&descriptor.partition_key.name))?;
    if let Some(sk) = &descriptor.sort_key {
        check_key(descriptor, sk, item.get(&sk.name))?;
    }
    Ok(())
}

fn check_key(
    descriptor: &TableDescriptor,
    key: &KeyAttribute,
    value: Option<&AttributeValue>,
) -> Result<()> {
    let value = value.ok_or_else(|| CoreError::MissingKeyAttribute {
        table: descriptor.name.clone(),
        attribute: key.name.clone(),
    })?;

    let matches = matches!(
        (key.attribute_type, value),
        (ScalarType::S, AttributeValue::S(_))
            | (ScalarType::N, AttributeValue::N(_))
            | (ScalarType::B, AttributeValue::B(_))
    );
    if !matches {
        return Err(CoreError::KeyTypeMismatch {
            attribute: key.name.clone(),
            expected: key.attribute_type.as_str(),
            found: value.type_tag(),
        });
    }

    if let AttributeValue::S(s) = value {
        if s.is_empty() {
            return Err(CoreError::InvalidKey(format!(
                "key attribute '{}' must not be an empty string",
                key.name
            )));
        }
    }
    Ok(())
}

/// Projects the key attributes out of a validated item.
pub fn key_of(descriptor: &TableDescriptor, item: &Item) -> Result<Item> {
    validate_item_keys(descriptor, item)?;
    Ok(descriptor
        .key_names()
        .into_iter()
        .filter_map(|name| item.get(name).map(|v| (name.to_string(), v.clone())))
        .collect())
}

/// Builds a key map from native partition and sort values.
///
/// The sort value must be given exactly when the table declares a sort key.
pub fn key_from_values(
    descriptor: &TableDescriptor,
    partition: &NativeValue,
    sort: Option<&NativeValue>,
) -> Result<Item> {
    let mut key = Item::new();
    key.insert(descriptor.partition_key.name.clone(), codec::marshal(partition));

    match (&descriptor.sort_key, sort) {
        (Some(sk), Some(value)) => {
            key.insert(sk.name.clone(), codec::marshal(value));
        }
        (Some(_), None) | (None, None) => {}
        (None, Some(_)) => {
            return Err(CoreError::InvalidKey(format!(
                "table '{}' has no sort key",
                descriptor.name
            )));
        }
    }

    validate_item_keys(descriptor, &key)?;
    Ok(key)
}

/// Renders the key attributes of `item` as `PK=..., SK=...` for logs and errors.
pub fn describe_key(descriptor: &TableDescriptor, item: &Item) -> String {
    descriptor
        .key_names()
        .into_iter()
        .map(|name| {
            let value = item
                .get(name)
                .map_or_else(|| "<missing>".to_string(), AttributeValue::display_scalar);
            format!("{name}={value}")
        })
        .collect::<Vec<_>>()
        .join(", ")
}
