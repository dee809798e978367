use async_trait::async_trait;
use chrono::{DateTime, Utc};
use es_domain::error::DomainResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 预留表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRow {
    pub key: String,
    pub owner: String,
    /// 过期时间（Unix 秒），永久预留为 `i64::MAX`
    #[serde(rename = "expires")]
    pub expires_at: i64,
}

impl ReservationRow {
    pub fn new(key: impl Into<String>, owner: impl Into<String>, expires_at: i64) -> Self {
        Self {
            key: key.into(),
            owner: owner.into(),
            expires_at,
        }
    }

    /// 由当前时间与预留时长计算过期时间
    pub fn expires_at(now: DateTime<Utc>, duration: Duration) -> i64 {
        if duration.is_zero() {
            return i64::MAX;
        }
        chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .map_or(i64::MAX, |at| at.timestamp())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now.timestamp()
    }
}

/// 预留表：以条件写保证同一键在任一时刻只属于一个持有者
#[async_trait]
pub trait ReservationTable: Send + Sync {
    /// 键不存在或已由同一持有者持有时写入（覆盖过期时间），
    /// 否则返回 `DomainError::AlreadyReserved`
    async fn put(&self, row: ReservationRow) -> DomainResult<()>;

    async fn get(&self, key: &str) -> DomainResult<Option<ReservationRow>>;

    /// 无条件删除，键不存在时同样成功
    async fn delete(&self, key: &str) -> DomainResult<()>;
}

#[async_trait]
impl<T: ReservationTable + ?Sized> ReservationTable for Arc<T> {
    async fn put(&self, row: ReservationRow) -> DomainResult<()> {
        (**self).put(row).await
    }

    async fn get(&self, key: &str) -> DomainResult<Option<ReservationRow>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        (**self).delete(key).await
    }
}
