//! 事件溯源统一错误定义
//!
//! 每个错误都带有一个分类码（`ErrorCode`），并可通过 `source()` 携带原因形成错误链。
//! 调用方借助 `has_code` 沿错误链判断分类（重试/上报/致命），无需依赖具体错误类型。
//!
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// 可跨线程传递的装箱错误，作为错误链中的原因
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// 错误分类码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AggregateNotFound,
    UnhandledEvent,
    InvalidEncoding,
    UnboundEventType,
    OptimisticConcurrencyConflict,
    DuplicateVersion,
    AlreadyReserved,
    ReservationExpired,
    InvalidCommand,
    Rejected,
    Store,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::AggregateNotFound => "AggregateNotFound",
            ErrorCode::UnhandledEvent => "UnhandledEvent",
            ErrorCode::InvalidEncoding => "InvalidEncoding",
            ErrorCode::UnboundEventType => "UnboundEventType",
            ErrorCode::OptimisticConcurrencyConflict => "OptimisticConcurrencyConflict",
            ErrorCode::DuplicateVersion => "DuplicateVersion",
            ErrorCode::AlreadyReserved => "err:singleton:already_reserved",
            ErrorCode::ReservationExpired => "err:singleton:expired",
            ErrorCode::InvalidCommand => "InvalidCommand",
            ErrorCode::Rejected => "Rejected",
            ErrorCode::Store => "Store",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化 ---
    #[error("[InvalidEncoding] {reason}")]
    InvalidEncoding {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("[UnboundEventType] unbound event type: {event_type}")]
    UnboundEventType { event_type: String },

    // --- 仓储 ---
    #[error("[AggregateNotFound] aggregate not found: {aggregate_id}")]
    AggregateNotFound { aggregate_id: String },
    #[error("[UnhandledEvent] aggregate={aggregate_id} was unable to handle event {event_type}")]
    UnhandledEvent {
        aggregate_id: String,
        event_type: String,
        #[source]
        source: BoxError,
    },

    // --- 存储 ---
    #[error(
        "[OptimisticConcurrencyConflict] aggregate={aggregate_id}, version={version} already written with different content"
    )]
    Conflict { aggregate_id: String, version: u64 },
    #[error("[DuplicateVersion] aggregate={aggregate_id}, version={version} submitted more than once")]
    DuplicateVersion { aggregate_id: String, version: u64 },
    #[error("[Store] {reason}")]
    Store {
        reason: String,
        #[source]
        source: Option<BoxError>,
    },

    // --- 资源预留 ---
    #[error("[{}] resource {key} is reserved by another owner", ErrorCode::AlreadyReserved)]
    AlreadyReserved { key: String },
    #[error("[{}] reservation of {key} has expired", ErrorCode::ReservationExpired)]
    ReservationExpired { key: String },

    // --- 命令 ---
    #[error("[InvalidCommand] {reason}")]
    InvalidCommand { reason: String },
    #[error("[Rejected] command rejected: {source}")]
    Rejected {
        #[source]
        source: BoxError,
    },
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::InvalidEncoding { .. } => ErrorCode::InvalidEncoding,
            DomainError::UnboundEventType { .. } => ErrorCode::UnboundEventType,
            DomainError::AggregateNotFound { .. } => ErrorCode::AggregateNotFound,
            DomainError::UnhandledEvent { .. } => ErrorCode::UnhandledEvent,
            DomainError::Conflict { .. } => ErrorCode::OptimisticConcurrencyConflict,
            DomainError::DuplicateVersion { .. } => ErrorCode::DuplicateVersion,
            DomainError::Store { .. } => ErrorCode::Store,
            DomainError::AlreadyReserved { .. } => ErrorCode::AlreadyReserved,
            DomainError::ReservationExpired { .. } => ErrorCode::ReservationExpired,
            DomainError::InvalidCommand { .. } => ErrorCode::InvalidCommand,
            DomainError::Rejected { .. } => ErrorCode::Rejected,
        }
    }

    /// 存储层错误，附带上下文说明
    pub fn store(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DomainError::Store {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    pub fn encoding(reason: impl Into<String>, source: impl Into<BoxError>) -> Self {
        DomainError::InvalidEncoding {
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        has_code(self, ErrorCode::AggregateNotFound)
    }

    pub fn is_conflict(&self) -> bool {
        has_code(self, ErrorCode::OptimisticConcurrencyConflict)
    }

    pub fn is_already_reserved(&self) -> bool {
        has_code(self, ErrorCode::AlreadyReserved)
    }
}

/// 沿错误链查找是否存在指定分类码
pub fn has_code(err: &(dyn StdError + 'static), code: ErrorCode) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(domain) = e.downcast_ref::<DomainError>() {
            if domain.code() == code {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// 错误链中是否包含「聚合不存在」
pub fn is_not_found(err: &(dyn StdError + 'static)) -> bool {
    has_code(err, ErrorCode::AggregateNotFound)
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::encoding("json codec failed", err)
    }
}

impl From<prost::DecodeError> for DomainError {
    fn from(err: prost::DecodeError) -> Self {
        DomainError::encoding("protobuf decode failed", err)
    }
}
