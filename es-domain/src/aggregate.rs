//! 聚合（Aggregate）抽象
//!
//! 聚合是对事件的左折叠累加器，能力拆分为两层：
//! - `Aggregate::on` 将事件折叠进状态，无法识别的事件返回错误（必需）；
//! - `CommandHandler::apply` 将命令转换为事件，不改变状态（命令驱动的聚合才需要）。
//!
use crate::command::Command;
use crate::event::Event;
use std::error::Error;

pub trait Aggregate: Default + Send + Sync + 'static {
    /// 该聚合折叠的事件类型
    type Event: Event;
    /// 折叠或命令执行的错误类型
    type Error: Error + Send + Sync + 'static;

    /// 应用事件，更新聚合状态
    fn on(&mut self, event: &Self::Event) -> Result<(), Self::Error>;
}

/// 命令处理能力
pub trait CommandHandler: Aggregate {
    type Command: Command;

    /// 执行命令，返回产生的事件（可为空）；违反业务规则时返回错误
    fn apply(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
