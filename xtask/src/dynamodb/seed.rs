//! Seed item generation and parsing (Functional Core - pure).

use ddbgate::ddbgate_core::{KeyAttribute, NativeItem, NativeValue, ScalarType, TableDescriptor};

use super::error::{DynamodbError, Result};

const DEMO_NAMES: [&str; 6] = ["tom", "ana", "bob", "eve", "kim", "lou"];

fn key_value(attribute: &KeyAttribute, text: &str, index: u32) -> NativeValue {
    match attribute.attribute_type {
        ScalarType::S => NativeValue::String(text.to_string()),
        ScalarType::N => NativeValue::from(index),
        ScalarType::B => NativeValue::bytes(text.as_bytes()),
    }
}

/// Generates `count` demo items that fit the table's key schema.
///
/// Tables with a sort key get one partition (`GROUP#DEMO`) holding
/// `USER#1..USER#n`. Tables without one get a partition per item.
pub fn generate_seed_items(descriptor: &TableDescriptor, count: u32) -> Vec<NativeItem> {
    (1..=count)
        .map(|i| {
            let mut item = NativeItem::new();
            let user = format!("USER#{i}");
            match &descriptor.sort_key {
                Some(sort_key) => {
                    item.insert(
                        descriptor.partition_key.name.clone(),
                        key_value(&descriptor.partition_key, "GROUP#DEMO", 0),
                    );
                    item.insert(sort_key.name.clone(), key_value(sort_key, &user, i));
                }
                None => {
                    item.insert(
                        descriptor.partition_key.name.clone(),
                        key_value(&descriptor.partition_key, &user, i),
                    );
                }
            }
            let name = DEMO_NAMES[(i as usize - 1) % DEMO_NAMES.len()];
            item.insert("Name".to_string(), name.into());
            item.insert("Age".to_string(), NativeValue::from(20 + i % 40));
            item
        })
        .collect()
}

/// Parses a JSON array of objects into items.
pub fn parse_seed_items(json: &str) -> Result<Vec<NativeItem>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let serde_json::Value::Array(rows) = value else {
        return Err(DynamodbError::InvalidArgument(
            "seed file must contain a JSON array of objects".to_string(),
        ));
    };

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match NativeValue::from(row) {
            NativeValue::Map(item) => Ok(item),
            _ => Err(DynamodbError::InvalidArgument(format!(
                "seed entry {index} is not a JSON object"
            ))),
        })
        .collect()
}

/// One-line summary of an item's key, for previews.
pub fn format_item_key(descriptor: &TableDescriptor, item: &NativeItem) -> String {
    descriptor
        .key_names()
        .into_iter()
        .map(|name| match item.get(name) {
            Some(value) => format!("{}={}", name, serde_json::Value::from(value.clone())),
            None => format!("{name}=?"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_logs() -> TableDescriptor {
        TableDescriptor::new("user_logs_1", KeyAttribute::string("PK"))
            .unwrap()
            .with_sort_key(KeyAttribute::string("SK"))
            .unwrap()
    }

    #[test]
    fn test_generate_items_share_partition_with_sort_key() {
        let items = generate_seed_items(&user_logs(), 30);

        assert_eq!(items.len(), 30);
        assert!(items.iter().all(|item| item["PK"] == "GROUP#DEMO".into()));
        assert_eq!(items[0]["SK"], "USER#1".into());
        assert_eq!(items[29]["SK"], "USER#30".into());
        assert_eq!(items[0]["Name"], "tom".into());
    }

    #[test]
    fn test_generate_items_numeric_partition_key() {
        let users = TableDescriptor::new("users", KeyAttribute::number("user_id")).unwrap();
        let items = generate_seed_items(&users, 3);

        let ids: Vec<_> = items.iter().map(|item| item["user_id"].clone()).collect();
        assert_eq!(ids, vec![1_u32.into(), 2_u32.into(), 3_u32.into()]);
    }

    #[test]
    fn test_generate_zero_items() {
        assert!(generate_seed_items(&user_logs(), 0).is_empty());
    }

    #[test]
    fn test_parse_seed_items() {
        let items = parse_seed_items(
            r#"[{"PK": "GROUP#DEV", "SK": "USER#1", "Age": 32, "Tags": ["a", "b"]}]"#,
        )
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["Age"], 32_i64.into());
        assert_eq!(
            items[0]["Tags"],
            NativeValue::Seq(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_parse_seed_items_rejects_non_objects() {
        assert!(matches!(
            parse_seed_items(r#"{"PK": "x"}"#),
            Err(DynamodbError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_seed_items(r#"[{"PK": "x"}, 3]"#),
            Err(DynamodbError::InvalidArgument(msg)) if msg.contains("entry 1")
        ));
        assert!(matches!(parse_seed_items("not json"), Err(DynamodbError::Json(_))));
    }

    #[test]
    fn test_format_item_key() {
        let items = generate_seed_items(&user_logs(), 1);
        assert_eq!(
            format_item_key(&user_logs(), &items[0]),
            r#"PK="GROUP#DEMO", SK="USER#1""#
        );
    }
}
