// 跳板机链路编排
//
// 模块结构:
// - item: 单跳状态机 (HopStatus, ChainItem) 与有序链路 (Chain)
// - error: 链路错误 (ChainError, Recovery)
// - resolver: 跳板机 ID 列表 -> 链路
// - establisher: 逐跳连接与认证，可从失败的跳继续
// - teardown: 逆序断开

mod error;
mod establisher;
mod item;
mod resolver;
mod teardown;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ChainError, Recovery};
pub use establisher::{establish, resolve_credentials};
pub use item::{Chain, ChainItem, HopSnapshot, HopStatus};
pub use resolver::resolve;
pub use teardown::teardown;
