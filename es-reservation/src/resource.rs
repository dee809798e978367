use es_domain::command::Command;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 一项唯一性约束，例如某个邮箱地址
///
/// - `resource_type`：命名空间，允许同一张表容纳多种资源，例如 `email`
/// - `id`：唯一值本身，例如规范化后的邮箱
/// - `owner`：持有者标识，同一持有者可以反复预留
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resource {
    pub resource_type: String,
    pub id: String,
    pub owner: String,
}

impl Resource {
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            owner: owner.into(),
        }
    }

    /// 预留表中的键：`type:id`
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource_type, self.id)
    }
}

/// 可声明资源预留的命令
///
/// 返回 `None` 的命令直接透传给下游；时长为零表示永久预留。
pub trait Reservable: Command {
    fn reservation(&self) -> Option<(Resource, Duration)> {
        None
    }
}
