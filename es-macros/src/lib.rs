//! es-macros：为事件与命令生成 `es-domain` 的 trait 实现
//!
use proc_macro::TokenStream;

mod command;
mod event;
mod utils;

/// 事件宏
///
/// 用于具名字段结构体：
/// - 追加字段：`id: String`, `version: u64`, `at: DateTime<Utc>`（若缺失）并置于字段最前
/// - 合并派生：`Debug, Clone, PartialEq, Default, Serialize, Deserialize`
/// - 实现 `::es_domain::event::Event`，类型名默认取结构体名，可用 `#[event(name = "...")]` 覆写
///
/// 用于枚举时，每个变体形如 `Variant(EventStruct)`：
/// - 生成委托给内部事件的 `Event` 实现，以及每个变体的 `From<EventStruct>`
/// - 默认追加 `#[serde(untagged)]`，序列化结果即内部事件本身，可直接交给 `JsonSerializer`
/// - `#[event(proto)]`：内部事件为 protobuf 消息，改为生成 `ProtoEvent` 实现（不派生 Serialize）
#[proc_macro_attribute]
pub fn event(attr: TokenStream, item: TokenStream) -> TokenStream {
    event::expand(attr, item)
}

/// 命令宏
/// - 追加字段 `id: String`（若缺失）
/// - 实现 `::es_domain::command::Command`
/// - `#[command(id = field)]` 使用指定字段作为目标聚合 ID
#[proc_macro_attribute]
pub fn command(attr: TokenStream, item: TokenStream) -> TokenStream {
    command::expand(attr, item)
}
