//! 聚合行为场景（Given / When / Then）
//!
//! 不依赖存储与序列化，直接在内存中折叠历史事件并执行命令，用于聚合单元测试：
//!
//! ```ignore
//! Scenario::<Order>::new()
//!     .given([created])
//!     .when(Ship { .. })
//!     .then([shipped]);
//! ```
//!
use crate::aggregate::CommandHandler;
use crate::error::{DomainError, DomainResult, ErrorCode, has_code};
use crate::event::Event;

pub struct Scenario<A: CommandHandler> {
    given: Vec<A::Event>,
    command: Option<A::Command>,
}

impl<A: CommandHandler> Default for Scenario<A> {
    fn default() -> Self {
        Self {
            given: Vec::new(),
            command: None,
        }
    }
}

impl<A: CommandHandler> Scenario<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置历史事件
    pub fn given(mut self, events: impl IntoIterator<Item = A::Event>) -> Self {
        self.given.extend(events);
        self
    }

    pub fn when(mut self, command: A::Command) -> Self {
        self.command = Some(command);
        self
    }

    /// 折叠历史并执行命令，返回产生的事件
    pub fn run(self) -> DomainResult<Vec<A::Event>> {
        let mut aggregate = A::default();
        for event in &self.given {
            aggregate
                .on(event)
                .map_err(|err| DomainError::UnhandledEvent {
                    aggregate_id: event.aggregate_id().to_string(),
                    event_type: event.event_type().to_string(),
                    source: Box::new(err),
                })?;
        }

        let Some(command) = self.command else {
            return Ok(Vec::new());
        };

        aggregate
            .apply(&command)
            .map_err(|err| DomainError::Rejected {
                source: Box::new(err),
            })
    }

    /// 断言命令产生的事件与期望一致
    ///
    /// 逐个比较事件类型、聚合 ID 与版本，不比较发生时间等内容字段。
    #[track_caller]
    pub fn then(self, expected: impl IntoIterator<Item = A::Event>) {
        let expected: Vec<A::Event> = expected.into_iter().collect();
        let actual = match self.run() {
            Ok(actual) => actual,
            Err(err) => panic!("expected events {expected:?}, got error: {err}"),
        };

        assert_eq!(
            actual.len(),
            expected.len(),
            "expected {} events, got {actual:?}",
            expected.len()
        );
        for (idx, (got, want)) in actual.iter().zip(&expected).enumerate() {
            assert_eq!(
                (got.event_type(), got.aggregate_id(), got.version()),
                (want.event_type(), want.aggregate_id(), want.version()),
                "event #{idx} differs: got {got:?}, expected {want:?}"
            );
        }
    }

    /// 断言命令失败，且错误链中带有指定分类码
    #[track_caller]
    pub fn then_error(self, code: ErrorCode) {
        match self.run() {
            Ok(events) => panic!("expected error {code}, got events: {events:?}"),
            Err(err) => assert!(has_code(&err, code), "expected error {code}, got: {err}"),
        }
    }
}
