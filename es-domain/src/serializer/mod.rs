//! 事件序列化（serializer）
//!
//! 通过「类型名 -> 解码函数」注册表实现多态事件的持久化：
//! - `JsonSerializer`：文本信封 `{"t": 类型名, "d": 事件体}`；
//! - `ProtoSerializer`：二进制信封 `Envelope { type, data }`，事件本身需为 protobuf 消息。
//!
//! 两种编解码语义一致：未注册的类型名返回 `UnboundEventType`，
//! 信封或事件体无法解析返回 `InvalidEncoding`。注册表可随时追加，同名以最后一次绑定为准。
//!
mod json;
mod proto;
mod registry;

pub use json::JsonSerializer;
pub use proto::{Envelope, ProtoEvent, ProtoSerializer};

use crate::error::DomainResult;
use crate::event::Event;
use crate::record::{History, Record};
use std::sync::Arc;

pub trait Serializer<E: Event>: Send + Sync {
    fn marshal_event(&self, event: &E) -> DomainResult<Record>;

    fn unmarshal_event(&self, record: &Record) -> DomainResult<E>;

    /// 按输入顺序批量序列化，遇到首个错误即返回
    fn marshal_all(&self, events: &[E]) -> DomainResult<History> {
        events.iter().map(|e| self.marshal_event(e)).collect()
    }
}

impl<E, T> Serializer<E> for Arc<T>
where
    E: Event,
    T: Serializer<E> + ?Sized,
{
    fn marshal_event(&self, event: &E) -> DomainResult<Record> {
        (**self).marshal_event(event)
    }

    fn unmarshal_event(&self, record: &Record) -> DomainResult<E> {
        (**self).unmarshal_event(record)
    }
}
