// 核心方法：终端的打开、更新、关闭与查询

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use super::{TerminalEntry, TerminalStatus};
use crate::chain::{self, Chain, ChainError, HopSnapshot};
use crate::models::HostData;
use crate::ssh::{SessionEventSender, SessionFactory};

/// 进程内所有打开的终端，按创建顺序保存
pub struct TerminalRegistry<S> {
    entries: Vec<TerminalEntry<S>>,
}

impl<S> Default for TerminalRegistry<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> TerminalRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析链路并登记新终端
    ///
    /// 同一主机已有 N 个终端时名称追加 " (N)"。
    pub fn open<F>(
        &mut self,
        host: &HostData,
        hosts_by_id: &HashMap<String, HostData>,
        factory: &F,
        events: &SessionEventSender,
    ) -> Result<TerminalEntry<S>, ChainError>
    where
        F: SessionFactory<Session = S>,
    {
        let chain = chain::resolve(host, hosts_by_id, factory, events)?;

        let existing = self
            .entries
            .iter()
            .filter(|entry| entry.host.id == host.id)
            .count();
        let name = if existing > 0 {
            format!("{} ({})", host.display_name(), existing)
        } else {
            host.display_name()
        };

        let entry = TerminalEntry {
            uuid: Uuid::new_v4(),
            host: host.clone(),
            name,
            status: TerminalStatus::Pending,
            error: None,
            hops: chain.snapshots(),
            chain: Arc::new(tokio::sync::Mutex::new(chain)),
        };
        info!(
            "[Registry] Terminal {} opened: {} ({} hop(s))",
            entry.uuid,
            entry.name,
            entry.hops.len()
        );
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// 整体替换（按 uuid 匹配），不存在时返回 false
    pub fn update(&mut self, entry: TerminalEntry<S>) -> bool {
        match self.entries.iter_mut().find(|e| e.uuid == entry.uuid) {
            Some(slot) => {
                *slot = entry;
                true
            }
            None => false,
        }
    }

    /// 记录单跳进度
    pub fn update_hop(&mut self, uuid: &Uuid, snapshot: HopSnapshot) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| &e.uuid == uuid) else {
            return false;
        };
        match entry.hops.get_mut(snapshot.index) {
            Some(slot) => {
                *slot = snapshot;
                true
            }
            None => false,
        }
    }

    /// 以当前链路状态覆盖全部跳，目标主机信息也随链路末跳同步
    pub fn sync_chain(&mut self, uuid: &Uuid, chain: &Chain<S>) -> bool {
        match self.entries.iter_mut().find(|e| &e.uuid == uuid) {
            Some(entry) => {
                entry.hops = chain.snapshots();
                entry.host = chain.target().host().clone();
                true
            }
            None => false,
        }
    }

    pub fn set_status(
        &mut self,
        uuid: &Uuid,
        status: TerminalStatus,
        error: Option<ChainError>,
    ) -> bool {
        match self.entries.iter_mut().find(|e| &e.uuid == uuid) {
            Some(entry) => {
                debug!("[Registry] Terminal {} status {:?}", uuid, status);
                entry.status = status;
                entry.error = error;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, uuid: &Uuid) -> Option<TerminalEntry<S>> {
        let pos = self.entries.iter().position(|e| &e.uuid == uuid)?;
        let entry = self.entries.remove(pos);
        info!("[Registry] Terminal {} removed: {}", uuid, entry.name);
        Some(entry)
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&TerminalEntry<S>> {
        self.entries.iter().find(|e| &e.uuid == uuid)
    }

    pub fn list(&self) -> &[TerminalEntry<S>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
