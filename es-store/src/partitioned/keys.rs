use super::table::{Item, TableError};
use es_domain::record::Record;

/// 事件属性名前缀
const PREFIX: &str = "_";

pub fn is_event_attribute(name: &str) -> bool {
    name.starts_with(PREFIX)
}

/// 版本号对应的属性名，例如 `_12`
pub fn event_attribute(version: u64) -> String {
    format!("{PREFIX}{version}")
}

pub fn version_from_attribute(name: &str) -> Result<u64, TableError> {
    name.strip_prefix(PREFIX)
        .and_then(|digits| digits.parse::<u64>().ok())
        .ok_or_else(|| TableError::InvalidKey {
            key: name.to_string(),
        })
}

/// 对比数据项更新前后的镜像，返回本次新增的记录（按版本升序）
pub fn changes(old: Option<&Item>, new: &Item) -> Vec<Record> {
    new.events
        .iter()
        .filter(|(version, _)| old.is_none_or(|o| !o.events.contains_key(version)))
        .map(|(version, data)| Record::new(*version, data.clone()))
        .collect()
}

/// 从变更流的事件源 ARN 中提取表名
///
/// 形如 `arn:aws:dynamodb:us-west-2:123456789012:table/orders/stream/2017-03-14T04:49:34.930`
pub fn table_name_from_stream_arn(arn: &str) -> Result<&str, TableError> {
    arn.split('/')
        .nth(1)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| TableError::InvalidItem {
            reason: format!("invalid event source arn: {arn}"),
        })
}
