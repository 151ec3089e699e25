//! [`AttributeStore`] implementation over `aws-sdk-dynamodb`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    BillingMode as SdkBillingMode, ProvisionedThroughput, PutRequest, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use ddbgate_core::{
    BillingMode, Condition, Item, QueryRequest, TableDescription, TableDescriptor,
    TableReadinessState, UpdatePlan,
};

use super::conversions::{from_sdk_item, into_sdk_item, key_schema};
use super::error::{
    map_batch_write_item_error, map_create_table_error, map_delete_table_error,
    map_describe_table_error, map_get_item_error, map_list_tables_error, map_put_item_error,
    map_query_error, map_update_item_error,
};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::AttributeStore;

/// DynamoDB-backed store.
///
/// Holds one SDK client for the life of the process; clone it to share.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Wraps an existing client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a client for the given region and optional local endpoint.
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config))
    }

    /// Creates a client from `AWS_ENDPOINT_URL` / `AWS_REGION`.
    pub async fn from_env() -> Self {
        Self::connect(&StoreConfig::from_env()).await
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    (!map.is_empty()).then_some(map)
}

#[async_trait]
impl AttributeStore for DynamoDbStore {
    async fn describe_table(&self, table: &str) -> StoreResult<Option<TableDescription>> {
        let output = match self.client.describe_table().table_name(table).send().await {
            Ok(output) => output,
            Err(err) => {
                return match map_describe_table_error(err, table) {
                    StoreError::ResourceNotFound(_) => Ok(None),
                    other => Err(other),
                }
            }
        };

        let description = output.table().ok_or_else(|| {
            StoreError::InvalidData(format!("DescribeTable returned no table for {table}"))
        })?;

        Ok(Some(TableDescription {
            name: description.table_name().unwrap_or(table).to_string(),
            state: description
                .table_status()
                .map_or(TableReadinessState::Unknown, |status| {
                    TableReadinessState::from_status(status.as_str())
                }),
            item_count: description.item_count(),
            size_bytes: description.table_size_bytes(),
        }))
    }

    async fn create_table(&self, descriptor: &TableDescriptor) -> StoreResult<()> {
        let (schema, definitions) = key_schema(descriptor)?;

        let mut request = self
            .client
            .create_table()
            .table_name(&descriptor.name)
            .set_key_schema(Some(schema))
            .set_attribute_definitions(Some(definitions));

        request = match descriptor.billing {
            BillingMode::OnDemand => request.billing_mode(SdkBillingMode::PayPerRequest),
            BillingMode::Provisioned {
                read_units,
                write_units,
            } => request
                .billing_mode(SdkBillingMode::Provisioned)
                .provisioned_throughput(
                    ProvisionedThroughput::builder()
                        .read_capacity_units(read_units)
                        .write_capacity_units(write_units)
                        .build()
                        .map_err(|e| StoreError::InvalidData(e.to_string()))?,
                ),
        };

        request
            .send()
            .await
            .map_err(|e| map_create_table_error(e, &descriptor.name))?;
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        self.client
            .delete_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| map_delete_table_error(e, table))?;
        Ok(())
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        let mut start: Option<String> = None;

        loop {
            let output = self
                .client
                .list_tables()
                .set_exclusive_start_table_name(start.take())
                .send()
                .await
                .map_err(map_list_tables_error)?;

            names.extend(output.table_names().iter().cloned());

            match output.last_evaluated_table_name() {
                Some(name) => start = Some(name.to_string()),
                None => break,
            }
        }

        Ok(names)
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> StoreResult<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(into_sdk_item(item)));

        if let Some(condition) = condition {
            request = request
                .condition_expression(condition.expression())
                .set_expression_attribute_names(Some(condition.names()));
        }

        request.send().await.map_err(map_put_item_error)?;
        Ok(())
    }

    async fn batch_write_item(&self, table: &str, items: Vec<Item>) -> StoreResult<Vec<Item>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let requests = items
            .into_iter()
            .map(|item| {
                PutRequest::builder()
                    .set_item(Some(into_sdk_item(item)))
                    .build()
                    .map(|put| WriteRequest::builder().put_request(put).build())
                    .map_err(|e| StoreError::InvalidData(e.to_string()))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(map_batch_write_item_error)?;

        output
            .unprocessed_items
            .unwrap_or_default()
            .remove(table)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.put_request)
            .map(|put| from_sdk_item(put.item))
            .collect()
    }

    async fn get_item(&self, table: &str, key: Item) -> StoreResult<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(into_sdk_item(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(map_get_item_error)?;

        output.item.map(from_sdk_item).transpose()
    }

    async fn query(&self, table: &str, request: &QueryRequest) -> StoreResult<Vec<Item>> {
        if request.limit == Some(0) {
            return Ok(Vec::new());
        }

        let values = non_empty(into_sdk_item(request.values.clone()));
        let names = non_empty(request.names.clone());
        let mut rows = Vec::new();
        let mut start_key = None;

        // A page stops at 1 MB, so keep paging until the limit or the end of the range.
        loop {
            let mut query = self
                .client
                .query()
                .table_name(table)
                .key_condition_expression(&request.key_condition)
                .set_expression_attribute_values(values.clone())
                .set_expression_attribute_names(names.clone())
                .scan_index_forward(request.order.scan_forward())
                .set_exclusive_start_key(start_key.take());

            if let Some(limit) = request.limit {
                let remaining = (limit as usize).saturating_sub(rows.len());
                query = query.limit(i32::try_from(remaining).unwrap_or(i32::MAX));
            }

            let output = query.send().await.map_err(map_query_error)?;

            for item in output.items.unwrap_or_default() {
                rows.push(from_sdk_item(item)?);
            }

            let filled = request.limit.is_some_and(|limit| rows.len() >= limit as usize);
            match output.last_evaluated_key {
                Some(key) if !filled && !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        Ok(rows)
    }

    async fn update_item(&self, table: &str, key: Item, plan: &UpdatePlan) -> StoreResult<()> {
        self.client
            .update_item()
            .table_name(table)
            .set_key(Some(into_sdk_item(key)))
            .update_expression(&plan.expression)
            .condition_expression(plan.condition.expression())
            .set_expression_attribute_names(Some(plan.names.clone()))
            .set_expression_attribute_values(Some(into_sdk_item(plan.values.clone())))
            .send()
            .await
            .map_err(map_update_item_error)?;
        Ok(())
    }
}
