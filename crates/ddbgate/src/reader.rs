//! Point lookups and key-condition range queries.

use std::sync::Arc;

use ddbgate_core::{codec, keys, NativeItem, NativeValue, QueryRequest, TableDescriptor};
use serde::de::DeserializeOwned;

use crate::context::CallContext;
use crate::error::{GatewayError, Result};
use crate::store::AttributeStore;

/// Reads items from the store.
#[derive(Clone)]
pub struct ReadGateway {
    store: Arc<dyn AttributeStore>,
}

impl ReadGateway {
    pub fn new(store: Arc<dyn AttributeStore>) -> Self {
        Self { store }
    }

    /// Strongly consistent fetch by primary key.
    ///
    /// `sort` is required exactly when the table declares a sort key. A miss
    /// is `NotFound`, which is a normal outcome and logged at debug.
    pub async fn find_by_key(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        partition: &NativeValue,
        sort: Option<&NativeValue>,
    ) -> Result<NativeItem> {
        const OPERATION: &str = "find_by_key";
        let table = descriptor.name.as_str();

        let key = keys::key_from_values(descriptor, partition, sort)?;
        let key_label = keys::describe_key(descriptor, &key);

        tracing::debug!(operation = OPERATION, table = %table, key = %key_label, "Fetching item");

        let found = ctx
            .run(OPERATION, self.store.get_item(table, key))
            .await?
            .map_err(|err| {
                tracing::error!(operation = OPERATION, table = %table, key = %key_label, error = %err, "Fetch failed");
                GatewayError::store_with_key(OPERATION, table, key_label.clone(), err)
            })?;

        match found {
            Some(item) => Ok(codec::unmarshal_item(&item)?),
            None => {
                tracing::debug!(operation = OPERATION, table = %table, key = %key_label, "Item not found");
                Err(GatewayError::NotFound {
                    table: table.to_string(),
                    key: Some(key_label),
                })
            }
        }
    }

    /// Like [`find_by_key`](Self::find_by_key), deserializing into `T`.
    pub async fn find_by_key_as<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        partition: &NativeValue,
        sort: Option<&NativeValue>,
    ) -> Result<T> {
        let item = self.find_by_key(ctx, descriptor, partition, sort).await?;
        Ok(codec::from_native_item(item)?)
    }

    /// Runs a key-condition query.
    ///
    /// The expression and bound values go to the store untouched. Rows come
    /// back in sort-key order (ascending unless the request says otherwise),
    /// at most `limit` of them.
    pub async fn find_by_condition(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        request: &QueryRequest,
    ) -> Result<Vec<NativeItem>> {
        const OPERATION: &str = "find_by_condition";
        let table = descriptor.name.as_str();

        tracing::debug!(
            operation = OPERATION,
            table = %table,
            condition = %request.key_condition,
            limit = ?request.limit,
            order = ?request.order,
            "Querying"
        );

        let rows = ctx
            .run(OPERATION, self.store.query(table, request))
            .await?
            .map_err(|err| {
                tracing::error!(operation = OPERATION, table = %table, error = %err, "Query failed");
                GatewayError::store_with_key(OPERATION, table, request.key_condition.clone(), err)
            })?;

        let rows = rows
            .iter()
            .map(codec::unmarshal_item)
            .collect::<ddbgate_core::Result<Vec<_>>>()?;

        tracing::debug!(operation = OPERATION, table = %table, rows = rows.len(), "Query complete");
        Ok(rows)
    }

    /// Like [`find_by_condition`](Self::find_by_condition), deserializing each row into `T`.
    pub async fn find_by_condition_as<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        request: &QueryRequest,
    ) -> Result<Vec<T>> {
        self.find_by_condition(ctx, descriptor, request)
            .await?
            .into_iter()
            .map(|row| codec::from_native_item(row).map_err(GatewayError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ddbgate_core::{AttributeValue, Item, KeyAttribute, SortOrder};
    use serde::Deserialize;

    use super::*;
    use crate::config::RetryPolicy;
    use crate::store::InMemoryStore;
    use crate::writer::WriteCoordinator;

    fn user_logs() -> TableDescriptor {
        TableDescriptor::new("user_logs_1", KeyAttribute::string("PK"))
            .unwrap()
            .with_sort_key(KeyAttribute::string("SK"))
            .unwrap()
    }

    fn member(group: &str, user: &str, name: &str) -> NativeItem {
        let mut item = NativeItem::new();
        item.insert("PK".to_string(), group.into());
        item.insert("SK".to_string(), user.into());
        item.insert("Name".to_string(), name.into());
        item
    }

    async fn seeded() -> (Arc<InMemoryStore>, ReadGateway) {
        let store = Arc::new(InMemoryStore::new());
        let writer = WriteCoordinator::new(store.clone(), RetryPolicy::immediate());
        let rows = vec![
            member("GROUP#DEV", "USER#2", "ana"),
            member("GROUP#DEV", "USER#3", "bob"),
            member("GROUP#DEV", "USER#1", "tom"),
            member("GROUP#OPS", "USER#4", "eve"),
        ];
        writer
            .insert_batch(&CallContext::new(), &user_logs(), &rows)
            .await
            .unwrap();
        (store.clone(), ReadGateway::new(store))
    }

    fn group_query(group: &str) -> QueryRequest {
        QueryRequest::new("PK = :pk").bind(":pk", group)
    }

    #[tokio::test]
    async fn test_find_by_key_round_trip() {
        let (_, reader) = seeded().await;

        let item = reader
            .find_by_key(
                &CallContext::new(),
                &user_logs(),
                &"GROUP#DEV".into(),
                Some(&"USER#3".into()),
            )
            .await
            .unwrap();

        assert_eq!(item, member("GROUP#DEV", "USER#3", "bob"));
    }

    #[tokio::test]
    async fn test_find_by_key_miss_is_not_found() {
        let (_, reader) = seeded().await;

        let result = reader
            .find_by_key(
                &CallContext::new(),
                &user_logs(),
                &"GROUP#DEV".into(),
                Some(&"USER#9".into()),
            )
            .await;

        assert_eq!(
            result,
            Err(GatewayError::NotFound {
                table: "user_logs_1".to_string(),
                key: Some("PK=GROUP#DEV, SK=USER#9".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn test_find_by_key_requires_sort_value() {
        let (_, reader) = seeded().await;

        let result = reader
            .find_by_key(&CallContext::new(), &user_logs(), &"GROUP#DEV".into(), None)
            .await;

        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn test_find_by_key_invalid_numeric_literal() {
        let (store, reader) = seeded().await;
        let mut corrupt = Item::new();
        corrupt.insert("PK".to_string(), AttributeValue::S("GROUP#QA".to_string()));
        corrupt.insert("SK".to_string(), AttributeValue::S("USER#5".to_string()));
        corrupt.insert("Age".to_string(), AttributeValue::N("thirty".to_string()));
        store.put_item("user_logs_1", corrupt, None).await.unwrap();

        let result = reader
            .find_by_key(
                &CallContext::new(),
                &user_logs(),
                &"GROUP#QA".into(),
                Some(&"USER#5".into()),
            )
            .await;

        assert_eq!(
            result,
            Err(GatewayError::InvalidNumericLiteral("thirty".to_string()))
        );
    }

    #[tokio::test]
    async fn test_find_by_condition_ascending_with_limit() {
        let (_, reader) = seeded().await;

        let rows = reader
            .find_by_condition(&CallContext::new(), &user_logs(), &group_query("GROUP#DEV").limit(2))
            .await
            .unwrap();

        let sort_keys: Vec<&str> = rows.iter().map(|r| r["SK"].as_str().unwrap()).collect();
        assert_eq!(sort_keys, vec!["USER#1", "USER#2"]);
    }

    #[tokio::test]
    async fn test_find_by_condition_descending() {
        let (_, reader) = seeded().await;

        let rows = reader
            .find_by_condition(
                &CallContext::new(),
                &user_logs(),
                &group_query("GROUP#DEV").order(SortOrder::Descending),
            )
            .await
            .unwrap();

        let sort_keys: Vec<&str> = rows.iter().map(|r| r["SK"].as_str().unwrap()).collect();
        assert_eq!(sort_keys, vec!["USER#3", "USER#2", "USER#1"]);
    }

    #[tokio::test]
    async fn test_find_by_condition_as_records() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Member {
            #[serde(rename = "SK")]
            user: String,
            #[serde(rename = "Name")]
            name: String,
        }

        let (_, reader) = seeded().await;
        let request = QueryRequest::new("PK = :pk AND begins_with(#sk, :prefix)")
            .bind(":pk", "GROUP#DEV")
            .bind(":prefix", "USER#")
            .name("#sk", "SK");

        let members: Vec<Member> = reader
            .find_by_condition_as(&CallContext::new(), &user_logs(), &request)
            .await
            .unwrap();

        assert_eq!(members.len(), 3);
        assert_eq!(
            members[0],
            Member {
                user: "USER#1".to_string(),
                name: "tom".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_find_by_condition_unknown_table() {
        let reader = ReadGateway::new(Arc::new(InMemoryStore::new()));

        let result = reader
            .find_by_condition(&CallContext::new(), &user_logs(), &group_query("GROUP#DEV"))
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::Store {
                operation: "find_by_condition",
                ..
            })
        ));
    }
}
