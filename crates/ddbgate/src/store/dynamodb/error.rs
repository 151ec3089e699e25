//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to [`StoreError`]. Dispatch failures and timeouts are
//! transport errors; throughput and request-limit rejections are throttling.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::delete_table::DeleteTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::list_tables::ListTablesError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;

use crate::error::StoreError;

const THROUGHPUT_EXCEEDED: &str = "Throughput exceeded, please retry";
const REQUEST_LIMIT_EXCEEDED: &str = "Request limit exceeded, please retry";
const INTERNAL_SERVER_ERROR: &str = "DynamoDB internal server error";

/// Errors raised before a response was received.
fn transport_error<E: Debug, R: Debug>(err: &SdkError<E, R>) -> Option<StoreError> {
    match err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            Some(StoreError::Transport(format!("{:?}", err)))
        }
        _ => None,
    }
}

/// Fallback for errors the operation does not model explicitly.
fn unmodeled<E: ProvideErrorMetadata + Debug>(operation: &str, err: E) -> StoreError {
    match err.code() {
        Some("ThrottlingException") => StoreError::Throttled(format!("{operation} throttled")),
        _ => StoreError::Service(format!("{operation} failed: {:?}", err)),
    }
}

/// Map a DescribeTable SDK error to StoreError.
pub fn map_describe_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DescribeTableError, R>,
    table: &str,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        DescribeTableError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound(table.to_string())
        }
        DescribeTableError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("DescribeTable", err),
    }
}

/// Map a CreateTable SDK error to StoreError.
pub fn map_create_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<CreateTableError, R>,
    table: &str,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        CreateTableError::ResourceInUseException(_) => StoreError::AlreadyExists(table.to_string()),
        CreateTableError::LimitExceededException(_) => {
            StoreError::Throttled("Table operation limit exceeded, please retry".to_string())
        }
        CreateTableError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("CreateTable", err),
    }
}

/// Map a DeleteTable SDK error to StoreError.
pub fn map_delete_table_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteTableError, R>,
    table: &str,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        DeleteTableError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound(table.to_string())
        }
        DeleteTableError::ResourceInUseException(_) => {
            StoreError::Service(format!("Table {table} is being created or updated"))
        }
        DeleteTableError::LimitExceededException(_) => {
            StoreError::Throttled("Table operation limit exceeded, please retry".to_string())
        }
        DeleteTableError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("DeleteTable", err),
    }
}

/// Map a ListTables SDK error to StoreError.
pub fn map_list_tables_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ListTablesError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        ListTablesError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("ListTables", err),
    }
}

/// Map a PutItem SDK error to StoreError.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => StoreError::ConditionFailed,
        PutItemError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound("Table not found".to_string())
        }
        PutItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled(THROUGHPUT_EXCEEDED.to_string())
        }
        PutItemError::RequestLimitExceeded(_) => {
            StoreError::Throttled(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        PutItemError::TransactionConflictException(_) => {
            StoreError::Throttled("Transaction conflict, please retry".to_string())
        }
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Service("Item collection size limit exceeded".to_string())
        }
        PutItemError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("PutItem", err),
    }
}

/// Map a BatchWriteItem SDK error to StoreError.
pub fn map_batch_write_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound("Table not found".to_string())
        }
        BatchWriteItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled(THROUGHPUT_EXCEEDED.to_string())
        }
        BatchWriteItemError::RequestLimitExceeded(_) => {
            StoreError::Throttled(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        BatchWriteItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Service("Item collection size limit exceeded".to_string())
        }
        BatchWriteItemError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("BatchWriteItem", err),
    }
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound("Table not found".to_string())
        }
        GetItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled(THROUGHPUT_EXCEEDED.to_string())
        }
        GetItemError::RequestLimitExceeded(_) => {
            StoreError::Throttled(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        GetItemError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("GetItem", err),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound("Table not found".to_string())
        }
        QueryError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled(THROUGHPUT_EXCEEDED.to_string())
        }
        QueryError::RequestLimitExceeded(_) => {
            StoreError::Throttled(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        QueryError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("Query", err),
    }
}

/// Map an UpdateItem SDK error to StoreError.
pub fn map_update_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<UpdateItemError, R>,
) -> StoreError {
    if let Some(e) = transport_error(&err) {
        return e;
    }
    match err.into_service_error() {
        UpdateItemError::ConditionalCheckFailedException(_) => StoreError::ConditionFailed,
        UpdateItemError::ResourceNotFoundException(_) => {
            StoreError::ResourceNotFound("Table not found".to_string())
        }
        UpdateItemError::ProvisionedThroughputExceededException(_) => {
            StoreError::Throttled(THROUGHPUT_EXCEEDED.to_string())
        }
        UpdateItemError::RequestLimitExceeded(_) => {
            StoreError::Throttled(REQUEST_LIMIT_EXCEEDED.to_string())
        }
        UpdateItemError::TransactionConflictException(_) => {
            StoreError::Throttled("Transaction conflict, please retry".to_string())
        }
        UpdateItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::Service("Item collection size limit exceeded".to_string())
        }
        UpdateItemError::InternalServerError(_) => {
            StoreError::Service(INTERNAL_SERVER_ERROR.to_string())
        }
        err => unmodeled("UpdateItem", err),
    }
}
