use crate::record::{StorageRecord, Value};
use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_dynamodb as dynamodb;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, record: &StorageRecord) -> Result<()>;
}

pub struct DynamoStore {
    ddb_client: dynamodb::Client,
    ddb_table: String,
}

impl DynamoStore {
    pub fn new(ddb_client: dynamodb::Client, ddb_table: String) -> DynamoStore {
        DynamoStore {
            ddb_client,
            ddb_table,
        }
    }

    pub fn table(&self) -> &str {
        &self.ddb_table
    }
}

fn attribute(value: &Value) -> AttributeValue {
    match value {
        Value::S(s) => AttributeValue::S(s.clone()),
        Value::N(n) => AttributeValue::N(n.to_string()),
        Value::Bool(b) => AttributeValue::Bool(*b),
    }
}

fn item(record: &StorageRecord) -> HashMap<String, AttributeValue> {
    record
        .iter()
        .map(|(name, value)| (name.to_owned(), attribute(value)))
        .collect()
}

#[async_trait]
impl RecordStore for DynamoStore {
    async fn put(&self, record: &StorageRecord) -> Result<()> {
        self.ddb_client
            .put_item()
            .table_name(&self.ddb_table)
            .set_item(Some(item(record)))
            .send()
            .await
            .map_err(|e| e.into_service_error())?;

        Ok(())
    }
}
