//! DynamoDB 预留表
//!
//! 表仅有哈希键 `key`（S），另含 `owner`（S）与 `expires`（N，Unix 秒）。
//!
use crate::config::RegistryConfig;
use crate::table::{ReservationRow, ReservationTable};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::create_table::CreateTableInput;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType,
};
use es_domain::error::{DomainError, DomainResult};
use std::collections::HashMap;
use tracing::info;

const HASH_KEY: &str = "key";
const OWNER: &str = "owner";
const EXPIRES: &str = "expires";

pub struct DynamoReservationTable {
    client: Client,
    table_name: String,
}

impl DynamoReservationTable {
    pub async fn connect(config: &RegistryConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        info!(table = %config.table_name, region = %config.region, "Connected reservation table");
        Self::from_client(Client::from_conf(builder.build()), config.table_name.clone())
    }

    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub async fn create_table(&self, read_capacity: i64, write_capacity: i64) -> DomainResult<()> {
        let input = create_table_input(&self.table_name, read_capacity, write_capacity)?;
        self.client
            .create_table()
            .set_table_name(input.table_name)
            .set_attribute_definitions(input.attribute_definitions)
            .set_key_schema(input.key_schema)
            .set_provisioned_throughput(input.provisioned_throughput)
            .send()
            .await
            .map_err(|err| {
                DomainError::store("DynamoDB create_table failed", err.into_service_error())
            })?;

        info!(table = %self.table_name, "Created reservation table");
        Ok(())
    }

    fn key(key: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([(HASH_KEY.to_string(), AttributeValue::S(key.to_string()))])
    }
}

/// 预留表的建表参数，仅哈希键 `key`(S)
pub fn create_table_input(
    table_name: &str,
    read_capacity: i64,
    write_capacity: i64,
) -> DomainResult<CreateTableInput> {
    let invalid = |err: BuildError| DomainError::store("invalid create table input", err);

    CreateTableInput::builder()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(HASH_KEY)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(invalid)?,
        )
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(HASH_KEY)
                .key_type(KeyType::Hash)
                .build()
                .map_err(invalid)?,
        )
        .provisioned_throughput(
            ProvisionedThroughput::builder()
                .read_capacity_units(read_capacity)
                .write_capacity_units(write_capacity)
                .build()
                .map_err(invalid)?,
        )
        .build()
        .map_err(invalid)
}

fn encode_row(row: &ReservationRow) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (HASH_KEY.to_string(), AttributeValue::S(row.key.clone())),
        (OWNER.to_string(), AttributeValue::S(row.owner.clone())),
        (EXPIRES.to_string(), AttributeValue::N(row.expires_at.to_string())),
    ])
}

fn decode_row(item: &HashMap<String, AttributeValue>) -> DomainResult<ReservationRow> {
    let string = |name: &str| match item.get(name) {
        Some(AttributeValue::S(s)) => Ok(s.clone()),
        _ => Err(DomainError::Store {
            reason: format!("reservation attribute {name} is missing or not a string"),
            source: None,
        }),
    };
    let expires_at = match item.get(EXPIRES) {
        Some(AttributeValue::N(n)) => n
            .parse::<i64>()
            .map_err(|err| DomainError::store(format!("invalid {EXPIRES} value: {n}"), err))?,
        _ => {
            return Err(DomainError::Store {
                reason: format!("reservation attribute {EXPIRES} is missing or not a number"),
                source: None,
            });
        }
    };

    Ok(ReservationRow {
        key: string(HASH_KEY)?,
        owner: string(OWNER)?,
        expires_at,
    })
}

#[async_trait]
impl ReservationTable for DynamoReservationTable {
    async fn put(&self, row: ReservationRow) -> DomainResult<()> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(encode_row(&row)))
            .condition_expression("attribute_not_exists(#key) or #owner = :owner")
            .expression_attribute_names("#key", HASH_KEY)
            .expression_attribute_names("#owner", OWNER)
            .expression_attribute_values(":owner", AttributeValue::S(row.owner.clone()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_conditional_check_failed_exception() {
                    Err(DomainError::AlreadyReserved { key: row.key })
                } else {
                    Err(DomainError::store("DynamoDB put_item failed", service))
                }
            }
        }
    }

    async fn get(&self, key: &str) -> DomainResult<Option<ReservationRow>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| DomainError::store("DynamoDB get_item failed", err.into_service_error()))?;

        match output.item() {
            Some(item) if !item.is_empty() => decode_row(item).map(Some),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(key)))
            .send()
            .await
            .map_err(|err| {
                DomainError::store("DynamoDB delete_item failed", err.into_service_error())
            })?;
        Ok(())
    }
}
