use super::Serializer;
use super::registry::Registry;
use crate::error::{DomainError, DomainResult};
use crate::event::Event;
use crate::record::Record;
use std::marker::PhantomData;

type ProtoDecoder<E> = fn(&[u8]) -> Result<E, prost::DecodeError>;

/// 二进制信封
#[derive(Clone, PartialEq, prost::Message)]
pub struct Envelope {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// 事件的 protobuf 编码能力
///
/// 返回 `None` 表示当前事件不是 protobuf 消息，序列化将以 `InvalidEncoding` 失败。
pub trait ProtoEvent: Event {
    fn encode_message(&self) -> Option<Vec<u8>>;
}

/// protobuf 二进制信封序列化器
pub struct ProtoSerializer<E> {
    registry: Registry<ProtoDecoder<E>>,
    _event: PhantomData<fn() -> E>,
}

impl<E> Default for ProtoSerializer<E> {
    fn default() -> Self {
        Self {
            registry: Registry::new(),
            _event: PhantomData,
        }
    }
}

impl<E: ProtoEvent> ProtoSerializer<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<T>(&self) -> &Self
    where
        T: Event + prost::Message + Default + Into<E>,
    {
        let name = T::default().event_type().to_string();
        self.bind_as::<T>(name)
    }

    pub fn bind_as<T>(&self, name: impl Into<String>) -> &Self
    where
        T: prost::Message + Default + Into<E>,
    {
        let name = name.into();
        tracing::debug!(event_type = %name, "bind protobuf event type");
        self.registry.insert(name, decode::<T, E>);
        self
    }

    pub fn bound(&self) -> usize {
        self.registry.len()
    }
}

fn decode<T, E>(data: &[u8]) -> Result<E, prost::DecodeError>
where
    T: prost::Message + Default + Into<E>,
{
    T::decode(data).map(Into::into)
}

impl<E: ProtoEvent> Serializer<E> for ProtoSerializer<E> {
    fn marshal_event(&self, event: &E) -> DomainResult<Record> {
        let data = event
            .encode_message()
            .ok_or_else(|| DomainError::InvalidEncoding {
                reason: format!("event {} is not a protobuf message", event.event_type()),
                source: None,
            })?;

        let envelope = Envelope {
            r#type: event.event_type().to_string(),
            data,
        };

        Ok(Record::new(
            event.version(),
            prost::Message::encode_to_vec(&envelope),
        ))
    }

    fn unmarshal_event(&self, record: &Record) -> DomainResult<E> {
        let envelope = <Envelope as prost::Message>::decode(record.data.as_slice())
            .map_err(|err| {
                DomainError::encoding(
                    format!("unable to decode envelope at version {}", record.version),
                    err,
                )
            })?;

        let decoder =
            self.registry
                .get(&envelope.r#type)
                .ok_or_else(|| DomainError::UnboundEventType {
                    event_type: envelope.r#type.clone(),
                })?;

        decoder(&envelope.data).map_err(|err| {
            DomainError::encoding(format!("unable to decode event {}", envelope.r#type), err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use chrono::{DateTime, Utc};

    #[derive(Clone, PartialEq, prost::Message)]
    struct Deposited {
        #[prost(string, tag = "1")]
        account: String,
        #[prost(uint64, tag = "2")]
        version: u64,
        #[prost(int64, tag = "3")]
        at_secs: i64,
        #[prost(int64, tag = "4")]
        amount: i64,
    }

    impl Event for Deposited {
        fn aggregate_id(&self) -> &str {
            &self.account
        }
        fn version(&self) -> u64 {
            self.version
        }
        fn occurred_at(&self) -> DateTime<Utc> {
            DateTime::from_timestamp(self.at_secs, 0).unwrap_or_default()
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum AccountEvent {
        Deposited(Deposited),
        Frozen { account: String, version: u64 },
    }

    impl From<Deposited> for AccountEvent {
        fn from(e: Deposited) -> Self {
            AccountEvent::Deposited(e)
        }
    }

    impl Event for AccountEvent {
        fn aggregate_id(&self) -> &str {
            match self {
                AccountEvent::Deposited(e) => e.aggregate_id(),
                AccountEvent::Frozen { account, .. } => account,
            }
        }
        fn version(&self) -> u64 {
            match self {
                AccountEvent::Deposited(e) => e.version,
                AccountEvent::Frozen { version, .. } => *version,
            }
        }
        fn occurred_at(&self) -> DateTime<Utc> {
            DateTime::<Utc>::default()
        }
        fn event_type(&self) -> &str {
            match self {
                AccountEvent::Deposited(e) => e.event_type(),
                AccountEvent::Frozen { .. } => "Frozen",
            }
        }
    }

    impl ProtoEvent for AccountEvent {
        fn encode_message(&self) -> Option<Vec<u8>> {
            match self {
                AccountEvent::Deposited(e) => Some(prost::Message::encode_to_vec(e)),
                AccountEvent::Frozen { .. } => None,
            }
        }
    }

    fn deposited(version: u64) -> AccountEvent {
        Deposited {
            account: "acc-1".into(),
            version,
            at_secs: 1_700_000_000,
            amount: 250,
        }
        .into()
    }

    #[test]
    fn round_trip_through_binary_envelope() {
        let s = ProtoSerializer::<AccountEvent>::new();
        s.bind::<Deposited>();

        let event = deposited(7);
        let record = s.marshal_event(&event).unwrap();
        assert_eq!(record.version, 7);

        let envelope = <Envelope as prost::Message>::decode(record.data.as_slice()).unwrap();
        assert_eq!(envelope.r#type, "Deposited");

        assert_eq!(s.unmarshal_event(&record).unwrap(), event);
    }

    #[test]
    fn non_message_event_fails_to_marshal() {
        let s = ProtoSerializer::<AccountEvent>::new();
        let err = s
            .marshal_event(&AccountEvent::Frozen {
                account: "acc-1".into(),
                version: 2,
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidEncoding);
    }

    #[test]
    fn unbound_and_garbage_records() {
        let s = ProtoSerializer::<AccountEvent>::new();
        let record = ProtoSerializer::<AccountEvent>::new()
            .marshal_event(&deposited(1))
            .unwrap();
        let err = s.unmarshal_event(&record).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnboundEventType);

        s.bind::<Deposited>();
        let err = s
            .unmarshal_event(&Record::new(1, vec![0xff, 0xff, 0xff]))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidEncoding);
    }
}
