//! 有序键值存储（RocksDB）
//!
//! 键布局：
//! - `evt 0x1F <id 长度: u32 大端><aggregate_id> 0x1F <version: u64 大端>` -> 事件内容，
//!   按版本有序，支持区间扫描；ID 带长度前缀，含 0x1F 的 ID 不会落入其他聚合的前缀；
//! - `meta 0x1F <aggregate_id>` -> 该聚合最后写入的版本；
//! - `seq 0x1F <offset: u64 大端>` -> `<aggregate_id><version: u64 大端>`，全局写入顺序；
//! - `counter 0x1F seq` -> 最后分配的全局位点。
//!
//! 在通用契约之外额外要求版本严格连续：新批次的首个版本必须为已存版本 + 1。
//!
use crate::config::OrderedStoreConfig;
use async_trait::async_trait;
use es_domain::error::{DomainError, DomainResult};
use es_domain::record::{History, Record, StreamRecord};
use es_domain::store::{Store, StreamReader, ensure_idempotent, prepare_records};
use parking_lot::Mutex;
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};

const SEP: u8 = 0x1F;
const PREFIX_EVENT: &[u8] = b"evt";
const PREFIX_META: &[u8] = b"meta";
const PREFIX_SEQ: &[u8] = b"seq";
const SEQ_COUNTER_KEY: &[u8] = b"counter\x1Fseq";

pub struct OrderedStore {
    db: DBWithThreadMode<MultiThreaded>,
    write_lock: Mutex<()>,
}

impl OrderedStore {
    pub fn open(config: &OrderedStoreConfig) -> DomainResult<Self> {
        let mut options = Options::default();
        options.create_if_missing(config.create_if_missing);
        let db = DBWithThreadMode::<MultiThreaded>::open(&options, &config.path)
            .map_err(|err| DomainError::store("unable to open rocksdb", err))?;

        tracing::info!(path = %config.path.display(), "opened ordered event store");
        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn last_version(&self, aggregate_id: &str) -> DomainResult<Option<u64>> {
        self.get_u64(&meta_key(aggregate_id.as_bytes()))
    }

    fn get_u64(&self, key: &[u8]) -> DomainResult<Option<u64>> {
        let value = self
            .db
            .get(key)
            .map_err(|err| DomainError::store("rocksdb get failed", err))?;
        value.map(|bytes| decode_u64(&bytes)).transpose()
    }

    fn scan(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History> {
        let prefix = event_prefix(aggregate_id);
        let start = event_key(aggregate_id, from_version);
        let iter = self
            .db
            .iterator(IteratorMode::From(start.as_slice(), Direction::Forward));

        let mut history = History::new();
        for item in iter {
            let (key, value) = item.map_err(|err| DomainError::store("rocksdb scan failed", err))?;
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            let version = decode_u64(&key[prefix.len()..])?;
            if to_version != 0 && version > to_version {
                break;
            }
            history.push(Record::new(version, value.to_vec()));
        }
        Ok(history)
    }
}

#[async_trait]
impl Store for OrderedStore {
    async fn save(&self, aggregate_id: &str, records: Vec<Record>) -> DomainResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let records = prepare_records(aggregate_id, records)?;
        let (first, last_incoming) = match (records.first(), records.last()) {
            (Some(f), Some(l)) => (f.version, l.version),
            _ => return Ok(()),
        };

        let _guard = self.write_lock.lock();
        let last = self.last_version(aggregate_id)?.unwrap_or(0);

        if first <= last {
            let stored = self.scan(aggregate_id, first, last_incoming)?;
            return ensure_idempotent(aggregate_id, &records, &stored);
        }

        let contiguous = first == last + 1
            && records
                .windows(2)
                .all(|w| w[1].version == w[0].version + 1);
        if !contiguous {
            tracing::debug!(aggregate_id, last, first, "rejected non-contiguous append");
            return Err(DomainError::Conflict {
                aggregate_id: aggregate_id.to_string(),
                version: first,
            });
        }

        let mut offset = self.get_u64(SEQ_COUNTER_KEY)?.unwrap_or(0);
        let mut batch = WriteBatch::default();
        for record in &records {
            offset += 1;
            batch.put(event_key(aggregate_id, record.version), &record.data);

            let mut pointer = aggregate_id.as_bytes().to_vec();
            pointer.extend_from_slice(&record.version.to_be_bytes());
            batch.put(seq_key(offset), pointer);
        }
        batch.put(meta_key(aggregate_id.as_bytes()), last_incoming.to_be_bytes());
        batch.put(SEQ_COUNTER_KEY, offset.to_be_bytes());

        self.db
            .write(batch)
            .map_err(|err| DomainError::store("rocksdb write failed", err))?;

        tracing::debug!(aggregate_id, first, last = last_incoming, offset, "appended records");
        Ok(())
    }

    async fn load(
        &self,
        aggregate_id: &str,
        from_version: u64,
        to_version: u64,
    ) -> DomainResult<History> {
        if self.last_version(aggregate_id)?.is_none() {
            return Err(DomainError::AggregateNotFound {
                aggregate_id: aggregate_id.to_string(),
            });
        }
        self.scan(aggregate_id, from_version, to_version)
    }
}

#[async_trait]
impl StreamReader for OrderedStore {
    async fn read(&self, offset: u64, count: usize) -> DomainResult<Vec<StreamRecord>> {
        let prefix = seq_prefix();
        let start = seq_key(offset.max(1));
        let limit = if count == 0 { usize::MAX } else { count };
        let iter = self
            .db
            .iterator(IteratorMode::From(start.as_slice(), Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            if records.len() >= limit {
                break;
            }
            let (key, pointer) =
                item.map_err(|err| DomainError::store("rocksdb scan failed", err))?;
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            let offset = decode_u64(&key[prefix.len()..])?;
            let split = pointer.len().checked_sub(8).ok_or_else(|| DomainError::Store {
                reason: format!("corrupt stream pointer at offset {offset}"),
                source: None,
            })?;
            let aggregate_id = String::from_utf8(pointer[..split].to_vec())
                .map_err(|err| DomainError::store("corrupt aggregate id in stream", err))?;
            let version = decode_u64(&pointer[split..])?;

            let data = self
                .db
                .get(event_key(&aggregate_id, version))
                .map_err(|err| DomainError::store("rocksdb get failed", err))?
                .ok_or_else(|| DomainError::Store {
                    reason: format!(
                        "stream offset {offset} points at missing event {aggregate_id}@{version}"
                    ),
                    source: None,
                })?;

            records.push(StreamRecord {
                offset,
                aggregate_id,
                record: Record::new(version, data),
            });
        }
        Ok(records)
    }
}

fn key_with_segments(parts: &[&[u8]]) -> Vec<u8> {
    let mut key = Vec::new();
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            key.push(SEP);
        }
        key.extend_from_slice(part);
    }
    key
}

fn event_prefix(aggregate_id: &str) -> Vec<u8> {
    let id = aggregate_id.as_bytes();
    let mut segment = Vec::with_capacity(4 + id.len());
    segment.extend_from_slice(&(id.len() as u32).to_be_bytes());
    segment.extend_from_slice(id);

    let mut prefix = key_with_segments(&[PREFIX_EVENT, &segment]);
    prefix.push(SEP);
    prefix
}

fn event_key(aggregate_id: &str, version: u64) -> Vec<u8> {
    let mut key = event_prefix(aggregate_id);
    key.extend_from_slice(&version.to_be_bytes());
    key
}

fn meta_key(name: &[u8]) -> Vec<u8> {
    key_with_segments(&[PREFIX_META, name])
}

fn seq_prefix() -> Vec<u8> {
    let mut prefix = PREFIX_SEQ.to_vec();
    prefix.push(SEP);
    prefix
}

fn seq_key(offset: u64) -> Vec<u8> {
    let mut key = seq_prefix();
    key.extend_from_slice(&offset.to_be_bytes());
    key
}

fn decode_u64(bytes: &[u8]) -> DomainResult<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| DomainError::Store {
        reason: format!("expected 8 bytes, found {}", bytes.len()),
        source: None,
    })?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_keys_sort_by_version() {
        let k1 = event_key("agg", 2);
        let k2 = event_key("agg", 10);
        let k3 = event_key("agg", 256);
        assert!(k1 < k2 && k2 < k3);
        assert!(k1.starts_with(&event_prefix("agg")));
        assert!(!event_key("agg-2", 1).starts_with(&event_prefix("agg")));
    }

    #[test]
    fn ids_containing_the_separator_keep_their_own_prefix() {
        let nested = "a\u{1f}b";
        assert!(!event_key(nested, 1).starts_with(&event_prefix("a")));
        assert!(!event_key("a", 1).starts_with(&event_prefix(nested)));
    }

    #[tokio::test]
    async fn read_fails_when_a_stream_pointer_has_no_event() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = OrderedStore::open(&OrderedStoreConfig::builder().path(dir.path()).build())
            .unwrap();
        store
            .save("agg", vec![Record::new(1, b"one".to_vec())])
            .await
            .unwrap();

        let mut pointer = b"ghost".to_vec();
        pointer.extend_from_slice(&1u64.to_be_bytes());
        store.db.put(seq_key(2), pointer).unwrap();

        let err = store.read(1, 0).await.unwrap_err();
        assert!(matches!(&err, DomainError::Store { reason, .. } if reason.contains("ghost@1")));
        assert_eq!(store.read(1, 1).await.unwrap().len(), 1);
    }

    #[test]
    fn decode_rejects_short_values() {
        assert_eq!(decode_u64(&7u64.to_be_bytes()).unwrap(), 7);
        assert!(decode_u64(&[1, 2, 3]).is_err());
    }
}
