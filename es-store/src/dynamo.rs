//! DynamoDB 条件写表
//!
//! 表结构：
//! - 哈希键 `key`（S）：聚合 ID
//! - 范围键 `partition`（N）：`version / events_per_item`
//! - `revision`（N）：每次成功写入加一
//! - `_<version>`（B）：序列化后的事件
//!
//! 单分区写入使用带条件的 `UpdateItem`，跨分区写入使用 `TransactWriteItems`。
//!
use crate::config::DynamoConfig;
use crate::partitioned::{
    Item, ItemTable, Page, PartitionWrite, TableError, event_attribute, is_event_attribute,
    version_from_attribute,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::config::Region;
use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::create_table::CreateTableInput;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, KeySchemaElement, KeyType, ProvisionedThroughput,
    ScalarAttributeType, StreamSpecification, StreamViewType, TransactWriteItem, Update,
};
use es_domain::record::Record;
use std::collections::HashMap;
use tracing::{debug, info};

const HASH_KEY: &str = "key";
const RANGE_KEY: &str = "partition";
const REVISION: &str = "revision";

type Attributes = HashMap<String, AttributeValue>;

pub struct DynamoItemTable {
    client: Client,
    table_name: String,
}

impl DynamoItemTable {
    pub async fn connect(config: &DynamoConfig) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let client = match &config.endpoint_url {
            Some(endpoint) => {
                let dynamo_config = aws_sdk_dynamodb::config::Builder::from(&shared)
                    .endpoint_url(endpoint)
                    .build();
                Client::from_conf(dynamo_config)
            }
            None => Client::new(&shared),
        };

        info!(table = %config.table_name, region = %config.region, "Connected to DynamoDB");
        Self::from_client(client, config.table_name.clone())
    }

    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// 按默认表结构建表，开启 `NEW_AND_OLD_IMAGES` 变更流
    pub async fn create_table(
        &self,
        read_capacity: i64,
        write_capacity: i64,
    ) -> Result<(), TableError> {
        let input = create_table_input(&self.table_name, read_capacity, write_capacity)?;
        self.client
            .create_table()
            .set_table_name(input.table_name)
            .set_attribute_definitions(input.attribute_definitions)
            .set_key_schema(input.key_schema)
            .set_provisioned_throughput(input.provisioned_throughput)
            .set_stream_specification(input.stream_specification)
            .send()
            .await
            .map_err(|err| {
                TableError::backend("DynamoDB create_table failed", err.into_service_error())
            })?;

        info!(table = %self.table_name, "Created DynamoDB event table");
        Ok(())
    }

    fn key(aggregate_id: &str, partition: u64) -> Attributes {
        HashMap::from([
            (HASH_KEY.to_string(), AttributeValue::S(aggregate_id.to_string())),
            (RANGE_KEY.to_string(), AttributeValue::N(partition.to_string())),
        ])
    }

    fn update(&self, aggregate_id: &str, write: &PartitionWrite) -> Result<Update, TableError> {
        let parts = UpdateParts::new(&write.records);
        Update::builder()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(aggregate_id, write.partition)))
            .update_expression(parts.update_expression)
            .condition_expression(parts.condition_expression)
            .set_expression_attribute_names(Some(parts.names))
            .set_expression_attribute_values(Some(parts.values))
            .build()
            .map_err(|err| TableError::backend("unable to build update", err))
    }

    async fn update_one(&self, aggregate_id: &str, write: &PartitionWrite) -> Result<(), TableError> {
        let parts = UpdateParts::new(&write.records);
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key(aggregate_id, write.partition)))
            .update_expression(parts.update_expression)
            .condition_expression(parts.condition_expression)
            .set_expression_attribute_names(Some(parts.names))
            .set_expression_attribute_values(Some(parts.values))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_conditional_check_failed_exception() {
                    Err(TableError::ConditionFailed)
                } else {
                    Err(TableError::backend("DynamoDB update_item failed", service))
                }
            }
        }
    }

    async fn update_all(
        &self,
        aggregate_id: &str,
        writes: &[PartitionWrite],
    ) -> Result<(), TableError> {
        let items = writes
            .iter()
            .map(|w| {
                self.update(aggregate_id, w)
                    .map(|update| TransactWriteItem::builder().update(update).build())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service = err.into_service_error();
                let condition_failed = match &service {
                    aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError::TransactionCanceledException(cancelled) => cancelled
                        .cancellation_reasons()
                        .iter()
                        .any(|reason| reason.code() == Some("ConditionalCheckFailed")),
                    _ => false,
                };
                if condition_failed {
                    Err(TableError::ConditionFailed)
                } else {
                    Err(TableError::backend("DynamoDB transact_write_items failed", service))
                }
            }
        }
    }
}

/// 事件表的建表参数：哈希键 `key`(S)、范围键 `partition`(N)，
/// 变更流携带新旧镜像以供 [`changes_from_images`] 使用
pub fn create_table_input(
    table_name: &str,
    read_capacity: i64,
    write_capacity: i64,
) -> Result<CreateTableInput, TableError> {
    let invalid = |err: BuildError| TableError::backend("invalid create table input", err);

    CreateTableInput::builder()
        .table_name(table_name)
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(HASH_KEY)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(invalid)?,
        )
        .attribute_definitions(
            AttributeDefinition::builder()
                .attribute_name(RANGE_KEY)
                .attribute_type(ScalarAttributeType::N)
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
        .key_schema(
            KeySchemaElement::builder()
                .attribute_name(RANGE_KEY)
                .key_type(KeyType::Range)
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
        .stream_specification(
            StreamSpecification::builder()
                .stream_enabled(true)
                .stream_view_type(StreamViewType::NewAndOldImages)
                .build()
                .map_err(invalid)?,
        )
        .build()
        .map_err(invalid)
}

/// 一次分区写入的表达式：`ADD #revision :one SET #_1 = :_1, ...`，
/// 条件为每个事件属性 `attribute_not_exists`
struct UpdateParts {
    update_expression: String,
    condition_expression: String,
    names: HashMap<String, String>,
    values: Attributes,
}

impl UpdateParts {
    fn new(records: &[Record]) -> Self {
        let mut names = HashMap::from([("#revision".to_string(), REVISION.to_string())]);
        let mut values = HashMap::from([(":one".to_string(), AttributeValue::N("1".to_string()))]);
        let mut sets = Vec::with_capacity(records.len());
        let mut conditions = Vec::with_capacity(records.len());

        for record in records {
            let attribute = event_attribute(record.version);
            let name = format!("#{attribute}");
            let value = format!(":{attribute}");
            sets.push(format!("{name} = {value}"));
            conditions.push(format!("attribute_not_exists({name})"));
            names.insert(name, attribute);
            values.insert(value, AttributeValue::B(Blob::new(record.data.clone())));
        }

        Self {
            update_expression: format!("ADD #revision :one SET {}", sets.join(", ")),
            condition_expression: conditions.join(" AND "),
            names,
            values,
        }
    }
}

/// 将 DynamoDB 数据项解码为 `Item`，忽略非事件属性
pub fn decode_item(attributes: &Attributes) -> Result<Item, TableError> {
    let aggregate_id = match attributes.get(HASH_KEY) {
        Some(AttributeValue::S(s)) => s.clone(),
        _ => {
            return Err(TableError::InvalidItem {
                reason: format!("missing string attribute {HASH_KEY}"),
            });
        }
    };
    let partition = number(attributes, RANGE_KEY)?.unwrap_or_default();
    let revision = number(attributes, REVISION)?.unwrap_or_default();

    let mut item = Item {
        aggregate_id,
        partition,
        revision,
        ..Default::default()
    };
    for (name, value) in attributes {
        if !is_event_attribute(name) {
            continue;
        }
        let version = version_from_attribute(name)?;
        let AttributeValue::B(blob) = value else {
            return Err(TableError::InvalidItem {
                reason: format!("attribute {name} is not binary"),
            });
        };
        item.events.insert(version, blob.as_ref().to_vec());
    }
    Ok(item)
}

fn number(attributes: &Attributes, name: &str) -> Result<Option<u64>, TableError> {
    match attributes.get(name) {
        Some(AttributeValue::N(n)) => n.parse::<u64>().map(Some).map_err(|_| {
            TableError::InvalidItem {
                reason: format!("attribute {name} is not an unsigned integer: {n}"),
            }
        }),
        Some(_) => Err(TableError::InvalidItem {
            reason: format!("attribute {name} is not a number"),
        }),
        None => Ok(None),
    }
}

/// 变更流记录的新增事件：对比 NewImage 与 OldImage
pub fn changes_from_images(
    new_image: &Attributes,
    old_image: Option<&Attributes>,
) -> Result<Vec<Record>, TableError> {
    let new = decode_item(new_image)?;
    let old = old_image.map(decode_item).transpose()?;
    Ok(crate::partitioned::changes(old.as_ref(), &new))
}

#[async_trait]
impl ItemTable for DynamoItemTable {
    async fn append(
        &self,
        aggregate_id: &str,
        writes: Vec<PartitionWrite>,
    ) -> Result<(), TableError> {
        let result = match writes.as_slice() {
            [] => Ok(()),
            [single] => self.update_one(aggregate_id, single).await,
            many => self.update_all(aggregate_id, many).await,
        };

        debug!(
            table = %self.table_name,
            aggregate_id = %aggregate_id,
            partitions = writes.len(),
            ok = result.is_ok(),
            "DynamoDB append"
        );
        result
    }

    async fn query(
        &self,
        aggregate_id: &str,
        from_partition: u64,
        to_partition: Option<u64>,
        after: Option<u64>,
    ) -> Result<Page, TableError> {
        let mut values = HashMap::from([
            (":key".to_string(), AttributeValue::S(aggregate_id.to_string())),
            (":from".to_string(), AttributeValue::N(from_partition.to_string())),
        ]);
        let key_condition = match to_partition {
            Some(to) => {
                values.insert(":to".to_string(), AttributeValue::N(to.to_string()));
                "#key = :key AND #partition BETWEEN :from AND :to"
            }
            None => "#key = :key AND #partition >= :from",
        };

        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression(key_condition)
            .expression_attribute_names("#key", HASH_KEY)
            .expression_attribute_names("#partition", RANGE_KEY)
            .set_expression_attribute_values(Some(values))
            .set_exclusive_start_key(after.map(|p| Self::key(aggregate_id, p)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| TableError::backend("DynamoDB query failed", err.into_service_error()))?;

        let items = output
            .items()
            .iter()
            .map(decode_item)
            .collect::<Result<Vec<_>, _>>()?;

        let last_partition = match output.last_evaluated_key() {
            Some(key) => number(key, RANGE_KEY)?,
            None => None,
        };

        Ok(Page {
            items,
            last_partition,
        })
    }

    async fn contains(&self, aggregate_id: &str) -> Result<bool, TableError> {
        let output = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression("#key = :key")
            .expression_attribute_names("#key", HASH_KEY)
            .expression_attribute_values(":key", AttributeValue::S(aggregate_id.to_string()))
            .limit(1)
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| TableError::backend("DynamoDB query failed", err.into_service_error()))?;

        Ok(output.count() > 0)
    }
}
