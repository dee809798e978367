//! 命令（Command）：请求修改单个聚合
//!
use std::fmt::Debug;

pub trait Command: Debug + Send + Sync + 'static {
    /// 目标聚合 ID
    fn aggregate_id(&self) -> &str;
}
