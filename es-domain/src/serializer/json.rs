use super::Serializer;
use super::registry::Registry;
use crate::error::{DomainError, DomainResult};
use crate::event::Event;
use crate::record::Record;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::marker::PhantomData;

type JsonDecoder<E> = fn(&RawValue) -> serde_json::Result<E>;

#[derive(Serialize)]
struct OutgoingEnvelope<'a, E: ?Sized> {
    #[serde(rename = "t")]
    event_type: &'a str,
    #[serde(rename = "d")]
    data: &'a E,
}

#[derive(Deserialize)]
struct IncomingEnvelope<'a> {
    #[serde(rename = "t")]
    event_type: String,
    #[serde(rename = "d", borrow)]
    data: &'a RawValue,
}

/// JSON 文本信封序列化器
///
/// `E` 的序列化结果应为具体事件本身的 JSON（例如 `#[event]` 生成的 untagged 枚举），
/// 反序列化时根据信封中的类型名选择注册的具体类型，再转换为 `E`。
pub struct JsonSerializer<E> {
    registry: Registry<JsonDecoder<E>>,
    _event: PhantomData<fn() -> E>,
}

impl<E> Default for JsonSerializer<E> {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            _event: PhantomData,
        }
    }
}

impl<E> JsonSerializer<E>
where
    E: Event + Serialize,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 以事件自身的类型名注册具体事件类型
    pub fn bind<T>(&self) -> &Self
    where
        T: Event + Default + DeserializeOwned + Into<E>,
    {
        let name = T::default().event_type().to_string();
        self.bind_as::<T>(name)
    }

    /// 以指定类型名注册具体事件类型
    pub fn bind_as<T>(&self, name: impl Into<String>) -> &Self
    where
        T: DeserializeOwned + Into<E>,
    {
        let name = name.into();
        tracing::debug!(event_type = %name, "bind json event type");
        self.registry.insert(name, decode::<T, E>);
        self
    }

    /// 已注册的类型数
    pub fn bound(&self) -> usize {
        self.registry.len()
    }
}

fn decode<T, E>(raw: &RawValue) -> serde_json::Result<E>
where
    T: DeserializeOwned + Into<E>,
{
    serde_json::from_str::<T>(raw.get()).map(Into::into)
}

impl<E> Serializer<E> for JsonSerializer<E>
where
    E: Event + Serialize,
{
    fn marshal_event(&self, event: &E) -> DomainResult<Record> {
        let envelope = OutgoingEnvelope {
            event_type: event.event_type(),
            data: event,
        };
        let data = serde_json::to_vec(&envelope).map_err(|err| {
            DomainError::encoding(
                format!("unable to encode event {}", event.event_type()),
                err,
            )
        })?;

        Ok(Record::new(event.version(), data))
    }

    fn unmarshal_event(&self, record: &Record) -> DomainResult<E> {
        let envelope: IncomingEnvelope<'_> =
            serde_json::from_slice(&record.data).map_err(|err| {
                DomainError::encoding(
                    format!("unable to decode envelope at version {}", record.version),
                    err,
                )
            })?;

        let decoder = self.registry.get(&envelope.event_type).ok_or_else(|| {
            DomainError::UnboundEventType {
                event_type: envelope.event_type.clone(),
            }
        })?;

        decoder(envelope.data).map_err(|err| {
            DomainError::encoding(
                format!("unable to decode event {}", envelope.event_type),
                err,
            )
        })
    }
}
