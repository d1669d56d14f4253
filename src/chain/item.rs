// 链路状态：单跳状态机与有序链路

use serde::Serialize;

use super::error::ChainError;
use crate::models::HostData;
use crate::ssh::ServerKeyDecision;

/// 单跳状态，只能向前推进
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HopStatus {
    #[default]
    Connecting,
    Connected,
    Authenticated,
}

impl HopStatus {
    /// 下一个状态；Authenticated 是终态
    pub fn advance(self) -> Self {
        match self {
            Self::Connecting => Self::Connected,
            Self::Connected | Self::Authenticated => Self::Authenticated,
        }
    }
}

/// 单跳状态快照（供观察者使用，不含会话）
#[derive(Clone, Debug)]
pub struct HopSnapshot {
    pub index: usize,
    pub host_id: String,
    pub host_name: String,
    pub status: HopStatus,
    pub pending_server_key_decision: Option<ServerKeyDecision>,
    pub error: Option<ChainError>,
}

/// 链路中的一跳
///
/// 会话由该项独占，建立和断开都在原地修改。
pub struct ChainItem<S> {
    pub(super) hop: usize,
    pub(super) host: HostData,
    pub(super) session: S,
    pub(super) status: HopStatus,
    pub(super) pending_server_key_decision: Option<ServerKeyDecision>,
    pub(super) error: Option<ChainError>,
}

impl<S> ChainItem<S> {
    pub(super) fn new(hop: usize, host: HostData, session: S) -> Self {
        Self {
            hop,
            host,
            session,
            status: HopStatus::Connecting,
            pending_server_key_decision: None,
            error: None,
        }
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn host(&self) -> &HostData {
        &self.host
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn status(&self) -> HopStatus {
        self.status
    }

    pub fn pending_server_key_decision(&self) -> Option<ServerKeyDecision> {
        self.pending_server_key_decision
    }

    pub fn error(&self) -> Option<&ChainError> {
        self.error.as_ref()
    }

    pub fn snapshot(&self) -> HopSnapshot {
        HopSnapshot {
            index: self.hop,
            host_id: self.host.id.clone(),
            host_name: self.host.display_name(),
            status: self.status,
            pending_server_key_decision: self.pending_server_key_decision,
            error: self.error.clone(),
        }
    }

    /// 设置下一次连接使用的主机公钥决定
    pub fn set_server_key_decision(&mut self, decision: Option<ServerKeyDecision>) {
        self.pending_server_key_decision = decision;
    }

    /// 整体替换主机信息（重新认证时使用）
    ///
    /// 已连接但端点变化时退回 Connecting，下一次建立会重新连接。
    pub fn replace_host(&mut self, host: HostData) {
        if self.status == HopStatus::Connected && !self.host.same_endpoint(&host) {
            self.status = HopStatus::Connecting;
        }
        self.host = host;
    }

    /// 断开后回到初始状态
    pub(super) fn reset(&mut self) {
        self.status = HopStatus::Connecting;
        self.pending_server_key_decision = None;
        self.error = None;
    }
}

/// 有序链路：跳板机在前，目标主机在最后
///
/// 创建后顺序固定，只允许原地修改单跳。
pub struct Chain<S> {
    pub(super) items: Vec<ChainItem<S>>,
}

impl<S> Chain<S> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ChainItem<S>] {
        &self.items
    }

    pub fn get(&self, hop: usize) -> Option<&ChainItem<S>> {
        self.items.get(hop)
    }

    pub fn get_mut(&mut self, hop: usize) -> Option<&mut ChainItem<S>> {
        self.items.get_mut(hop)
    }

    /// 第一个尚未认证的跳
    pub fn current_hop(&self) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.status != HopStatus::Authenticated)
    }

    pub fn current_item_mut(&mut self) -> Option<&mut ChainItem<S>> {
        let hop = self.current_hop()?;
        self.items.get_mut(hop)
    }

    /// 目标主机（最后一跳）
    pub fn target(&self) -> &ChainItem<S> {
        &self.items[self.items.len() - 1]
    }

    pub fn is_established(&self) -> bool {
        self.current_hop().is_none()
    }

    /// 第一个未认证且带有错误的跳的错误
    pub fn first_error(&self) -> Option<&ChainError> {
        self.items
            .iter()
            .filter(|item| item.status != HopStatus::Authenticated)
            .find_map(|item| item.error.as_ref())
    }

    pub fn snapshots(&self) -> Vec<HopSnapshot> {
        self.items.iter().map(ChainItem::snapshot).collect()
    }
}
