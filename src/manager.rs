// 终端管理器
// 负责打开终端、在后台任务中建立链路、重试、关闭，以及监听断开通知

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chain::{self, Chain, ChainError, HopSnapshot};
use crate::models::{HostConfig, HostData};
use crate::ssh::{ServerKeyDecision, SessionEvent, SessionEventReceiver, SessionFactory};
use crate::state::{TerminalEntry, TerminalRegistry, TerminalStatus};

/// 管理器对外发出的事件
#[derive(Clone, Debug)]
pub enum TerminalEvent {
    /// 某一跳状态变化（成功或失败）
    HopUpdated { uuid: Uuid, hop: HopSnapshot },
    /// 整条链路建立完成
    Established { uuid: Uuid, host_id: String },
    /// 建立失败，停在 error 指出的那一跳
    Failed { uuid: Uuid, error: ChainError },
    /// 已建立的链路被远端断开
    Closed { uuid: Uuid, error: ChainError },
    /// 拆除完成
    TornDown { uuid: Uuid },
}

pub type TerminalEventReceiver = mpsc::UnboundedReceiver<TerminalEvent>;

type Session<F> = <F as SessionFactory>::Session;

struct Inner<F: SessionFactory> {
    factory: F,
    config: RwLock<HostConfig>,
    registry: Mutex<TerminalRegistry<Session<F>>>,
    events: mpsc::UnboundedSender<TerminalEvent>,
}

impl<F: SessionFactory> Inner<F> {
    fn emit(&self, event: TerminalEvent) {
        let _ = self.events.send(event);
    }
}

/// 终端管理器句柄，可以随意克隆
pub struct TerminalManager<F: SessionFactory> {
    inner: Arc<Inner<F>>,
}

impl<F: SessionFactory> Clone for TerminalManager<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: SessionFactory> TerminalManager<F> {
    pub fn new(config: HostConfig, factory: F) -> (Self, TerminalEventReceiver) {
        let (events, receiver) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Arc::new(Inner {
                factory,
                config: RwLock::new(config),
                registry: Mutex::new(TerminalRegistry::new()),
                events,
            }),
        };
        (manager, receiver)
    }

    /// 替换主机/密钥配置，只影响之后的打开和重试
    pub fn replace_config(&self, config: HostConfig) {
        *self.inner.config.write() = config;
    }

    /// 打开到指定主机的终端，并在后台开始建立链路
    ///
    /// 需要在 tokio 运行时内调用。
    pub fn open_terminal(&self, host_id: &str) -> Result<TerminalEntry<Session<F>>, ChainError> {
        let (host, hosts_by_id) = {
            let config = self.inner.config.read();
            let host = config
                .find_host(host_id)
                .cloned()
                .ok_or_else(|| ChainError::UnresolvedHost(host_id.to_string()))?;
            (host, config.hosts_by_id())
        };

        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let entry =
            self.inner
                .registry
                .lock()
                .open(&host, &hosts_by_id, &self.inner.factory, &session_tx)?;
        drop(session_tx);

        // 新链路上不会有其他持有者
        let guard = entry
            .chain
            .clone()
            .try_lock_owned()
            .map_err(|_| ChainError::EstablishInFlight)?;

        tokio::spawn(watch_disconnects(
            Arc::downgrade(&self.inner),
            entry.uuid,
            session_rx,
        ));
        tokio::spawn(drive(self.inner.clone(), entry.uuid, guard));
        Ok(entry)
    }

    /// 从当前跳重试
    pub fn retry(&self, uuid: Uuid) -> Result<(), ChainError> {
        self.restart(uuid, |_| {})
    }

    /// 为当前跳设置主机公钥决定后重连
    pub fn accept_server_key(&self, uuid: Uuid, decision: ServerKeyDecision) -> Result<(), ChainError> {
        self.restart(uuid, |chain| {
            if let Some(item) = chain.current_item_mut() {
                item.set_server_key_decision(Some(decision));
            }
        })
    }

    /// 替换当前跳的主机信息（通常是新凭据）后重新认证
    pub fn reauthenticate(&self, uuid: Uuid, host: HostData) -> Result<(), ChainError> {
        self.restart(uuid, |chain| {
            if let Some(item) = chain.current_item_mut() {
                item.replace_host(host);
            }
        })
    }

    fn restart<P>(&self, uuid: Uuid, prepare: P) -> Result<(), ChainError>
    where
        P: FnOnce(&mut Chain<Session<F>>),
    {
        let chain = self
            .inner
            .registry
            .lock()
            .get(&uuid)
            .map(|entry| entry.chain.clone())
            .ok_or(ChainError::TerminalNotFound(uuid))?;

        let mut guard = chain
            .try_lock_owned()
            .map_err(|_| ChainError::EstablishInFlight)?;
        prepare(&mut *guard);
        self.inner
            .registry
            .lock()
            .sync_chain(&uuid, &*guard);

        info!(
            "[Manager] Terminal {} resuming at hop {:?}",
            uuid,
            guard.current_hop()
        );
        tokio::spawn(drive(self.inner.clone(), uuid, guard));
        Ok(())
    }

    /// 关闭终端：立即移除，拆除在后台等待进行中的建立结束后执行
    pub fn close_terminal(&self, uuid: Uuid) -> Result<TerminalEntry<Session<F>>, ChainError> {
        let entry = self
            .inner
            .registry
            .lock()
            .remove(&uuid)
            .ok_or(ChainError::TerminalNotFound(uuid))?;

        let chain = entry.chain.clone();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let mut chain = chain.lock_owned().await;
            chain::teardown(&mut *chain).await;
            info!("[Manager] Terminal {} torn down", uuid);
            inner.emit(TerminalEvent::TornDown { uuid });
        });
        Ok(entry)
    }

    pub fn get(&self, uuid: Uuid) -> Option<TerminalEntry<Session<F>>> {
        self.inner.registry.lock().get(&uuid).cloned()
    }

    pub fn list(&self) -> Vec<TerminalEntry<Session<F>>> {
        self.inner.registry.lock().list().to_vec()
    }

    /// 外层（shell 等）更新终端状态
    pub fn set_status(&self, uuid: Uuid, status: TerminalStatus, error: Option<ChainError>) -> bool {
        self.inner.registry.lock().set_status(&uuid, status, error)
    }
}

/// 在持有链路锁的情况下跑一次建立
async fn drive<F: SessionFactory>(
    inner: Arc<Inner<F>>,
    uuid: Uuid,
    mut chain: OwnedMutexGuard<Chain<Session<F>>>,
) {
    let keys_by_id = inner.config.read().keys_by_id();
    inner
        .registry
        .lock()
        .set_status(&uuid, TerminalStatus::Pending, None);

    let result = chain::establish(&mut *chain, &keys_by_id, |snapshot| {
        if inner.registry.lock().update_hop(&uuid, snapshot.clone()) {
            inner.emit(TerminalEvent::HopUpdated {
                uuid,
                hop: snapshot,
            });
        }
    })
    .await
    .map(|_| ());

    match result {
        Ok(()) => {
            let host_id = chain.target().host().id.clone();
            if inner
                .registry
                .lock()
                .set_status(&uuid, TerminalStatus::Success, None)
            {
                info!("[Manager] Terminal {} established ({})", uuid, host_id);
                inner.emit(TerminalEvent::Established { uuid, host_id });
            } else {
                debug!("[Manager] Terminal {} closed during establishment", uuid);
            }
        }
        Err(error) => {
            if inner
                .registry
                .lock()
                .set_status(&uuid, TerminalStatus::Failed, Some(error.clone()))
            {
                warn!("[Manager] Terminal {} failed: {}", uuid, error);
                inner.emit(TerminalEvent::Failed { uuid, error });
            } else {
                debug!("[Manager] Terminal {} closed during establishment", uuid);
            }
        }
    }
}

/// 监听底层断开通知；已建立的链路断开时关闭终端
async fn watch_disconnects<F: SessionFactory>(
    inner: Weak<Inner<F>>,
    uuid: Uuid,
    mut events: SessionEventReceiver,
) {
    while let Some(SessionEvent::Disconnected { hop, reason }) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let status = inner.registry.lock().get(&uuid).map(|entry| entry.status);
        match status {
            None => break,
            Some(TerminalStatus::Success) => {}
            Some(_) => {
                debug!(
                    "[Manager] Terminal {} hop {} dropped before establishment: {}",
                    uuid, hop, reason
                );
                continue;
            }
        }

        warn!(
            "[Manager] Terminal {} closed: hop {} {}",
            uuid, hop, reason
        );
        inner
            .registry
            .lock()
            .set_status(&uuid, TerminalStatus::Failed, Some(ChainError::ChainClosed));
        inner.emit(TerminalEvent::Closed {
            uuid,
            error: ChainError::ChainClosed,
        });

        let manager = TerminalManager { inner };
        if let Err(e) = manager.close_terminal(uuid) {
            debug!("[Manager] Terminal {} already closed: {}", uuid, e);
        }
        break;
    }
    debug!("[Manager] Terminal {} watcher finished", uuid);
}
