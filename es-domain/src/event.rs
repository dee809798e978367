//! 领域事件（Event）
//!
//! 事件是聚合上已发生的不可变事实，携带聚合标识、版本与发生时间。
//! 事件类型名用于序列化信封中的类型标记，默认取结构体名，可显式覆写。
//!
use chrono::{DateTime, Utc};
use std::fmt::Debug;

pub trait Event: Debug + Send + Sync + 'static {
    /// 所属聚合 ID
    fn aggregate_id(&self) -> &str;

    /// 聚合内版本号
    fn version(&self) -> u64;

    /// 发生时间
    fn occurred_at(&self) -> DateTime<Utc>;

    /// 序列化时使用的类型名
    fn event_type(&self) -> &str {
        short_type_name::<Self>()
    }
}

/// 去掉模块路径后的类型名，例如 `app::user::Created` -> `Created`
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Opened {
        id: String,
    }

    impl Event for Opened {
        fn aggregate_id(&self) -> &str {
            &self.id
        }
        fn version(&self) -> u64 {
            1
        }
        fn occurred_at(&self) -> DateTime<Utc> {
            DateTime::<Utc>::default()
        }
    }

    #[test]
    fn default_event_type_is_the_struct_name() {
        let e = Opened { id: "a".into() };
        assert_eq!(e.event_type(), "Opened");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
