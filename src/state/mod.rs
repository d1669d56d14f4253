// 终端会话状态
// 每个打开的终端对应一条链路，由 TerminalRegistry 统一持有

mod core;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::chain::{Chain, ChainError, HopSnapshot};
use crate::models::HostData;

pub use self::core::TerminalRegistry;

/// 链路共享句柄
///
/// 建立过程在整个尝试期间持有锁，拆除会等待它释放。
pub type SharedChain<S> = Arc<tokio::sync::Mutex<Chain<S>>>;

/// 终端整体状态
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

/// 单个终端
pub struct TerminalEntry<S> {
    pub uuid: Uuid,
    pub host: HostData,
    /// 显示名称，同一主机多开时带 " (N)" 后缀
    pub name: String,
    pub status: TerminalStatus,
    pub error: Option<ChainError>,
    /// 各跳最近一次的状态
    pub hops: Vec<HopSnapshot>,
    pub chain: SharedChain<S>,
}

// 会话本身不可 Clone，只共享句柄
impl<S> Clone for TerminalEntry<S> {
    fn clone(&self) -> Self {
        Self {
            uuid: self.uuid,
            host: self.host.clone(),
            name: self.name.clone(),
            status: self.status,
            error: self.error.clone(),
            hops: self.hops.clone(),
            chain: self.chain.clone(),
        }
    }
}

// 链路里的会话不要求 Debug，只打印终端自身的状态
impl<S> fmt::Debug for TerminalEntry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalEntry")
            .field("uuid", &self.uuid)
            .field("host_id", &self.host.id)
            .field("name", &self.name)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("hops", &self.hops)
            .finish_non_exhaustive()
    }
}

impl<S> TerminalEntry<S> {
    /// 第一个尚未认证的跳
    pub fn current_hop(&self) -> Option<&HopSnapshot> {
        self.hops
            .iter()
            .find(|hop| hop.status != crate::chain::HopStatus::Authenticated)
    }

    /// 需要展示给用户的错误：优先取未认证跳上的错误
    pub fn visible_error(&self) -> Option<&ChainError> {
        self.hops
            .iter()
            .filter(|hop| hop.status != crate::chain::HopStatus::Authenticated)
            .find_map(|hop| hop.error.as_ref())
            .or(self.error.as_ref())
    }
}
