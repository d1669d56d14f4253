// 测试用的会话原语
// 记录每一次 connect / authenticate / disconnect，并可按主机脚本化失败

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::models::{AuthenticationMethod, HostData};
use crate::ssh::{
    AuthCredentials, ConnectTarget, DisconnectReason, ServerKeyDecision, SessionEvent,
    SessionEventSender, SessionFactory, SessionPrimitive, SshError,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Connect {
        host: String,
        via: Option<String>,
        decision: Option<ServerKeyDecision>,
    },
    Authenticate {
        host: String,
        ok: bool,
    },
    Disconnect {
        host: String,
    },
}

pub fn connect(host: &str, via: Option<&str>) -> Call {
    Call::Connect {
        host: host.to_string(),
        via: via.map(str::to_string),
        decision: None,
    }
}

pub fn auth(host: &str, ok: bool) -> Call {
    Call::Authenticate {
        host: host.to_string(),
        ok,
    }
}

pub fn disconnect(host: &str) -> Call {
    Call::Disconnect {
        host: host.to_string(),
    }
}

#[derive(Default)]
struct World {
    calls: Vec<Call>,
    created: usize,
    unknown_keys: HashSet<String>,
    refused: HashSet<String>,
    passwords: HashMap<String, String>,
    auth_gates: HashMap<String, Arc<Notify>>,
    broken_disconnect: HashSet<String>,
    senders: HashMap<String, (usize, SessionEventSender)>,
}

/// 脚本化的会话工厂，所有会话共享同一份调用记录
#[derive(Clone, Default)]
pub struct MockFactory {
    world: Arc<Mutex<World>>,
}

impl MockFactory {
    pub fn calls(&self) -> Vec<Call> {
        self.world.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.world.lock().calls.clear();
    }

    pub fn sessions_created(&self) -> usize {
        self.world.lock().created
    }

    /// 主机公钥未知：没有决定时连接失败
    pub fn unknown_key(&self, host_id: &str) {
        self.world.lock().unknown_keys.insert(host_id.to_string());
    }

    pub fn refuse_connect(&self, host_id: &str) {
        self.world.lock().refused.insert(host_id.to_string());
    }

    /// 只接受指定密码
    pub fn require_password(&self, host_id: &str, password: &str) {
        self.world
            .lock()
            .passwords
            .insert(host_id.to_string(), password.to_string());
    }

    /// 认证在 Notify 放行前一直挂起
    pub fn gate_auth(&self, host_id: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.world
            .lock()
            .auth_gates
            .insert(host_id.to_string(), notify.clone());
        notify
    }

    pub fn break_disconnect(&self, host_id: &str) {
        self.world
            .lock()
            .broken_disconnect
            .insert(host_id.to_string());
    }

    /// 模拟服务器主动断开
    pub fn drop_connection(&self, host_id: &str) {
        let world = self.world.lock();
        if let Some((hop, events)) = world.senders.get(host_id) {
            let _ = events.send(SessionEvent::Disconnected {
                hop: *hop,
                reason: DisconnectReason::Server,
            });
        }
    }
}

impl SessionFactory for MockFactory {
    type Session = MockSession;

    fn create(&self, hop: usize, host: &HostData, events: SessionEventSender) -> MockSession {
        self.world.lock().created += 1;
        MockSession {
            hop,
            host_id: host.id.clone(),
            world: self.world.clone(),
            events,
            connected: false,
            authenticated: false,
        }
    }
}

pub struct MockSession {
    hop: usize,
    host_id: String,
    world: Arc<Mutex<World>>,
    events: SessionEventSender,
    connected: bool,
    authenticated: bool,
}

impl MockSession {
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

#[async_trait]
impl SessionPrimitive for MockSession {
    async fn connect(
        &mut self,
        _target: &ConnectTarget,
        tunnel: Option<&Self>,
        decision: Option<ServerKeyDecision>,
    ) -> Result<(), SshError> {
        let result = {
            let mut world = self.world.lock();
            world.calls.push(Call::Connect {
                host: self.host_id.clone(),
                via: tunnel.map(|t| t.host_id.clone()),
                decision,
            });

            if tunnel.is_some_and(|t| !t.authenticated) {
                Err(SshError::NotConnected)
            } else if world.refused.contains(&self.host_id) {
                Err(SshError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )))
            } else if world.unknown_keys.contains(&self.host_id) {
                match decision {
                    None => Err(SshError::UnknownServerKey {
                        algorithm: "ssh-ed25519".to_string(),
                        fingerprint: format!("SHA256:{}", self.host_id),
                    }),
                    Some(ServerKeyDecision::AddAndContinue) => {
                        world.unknown_keys.remove(&self.host_id);
                        Ok(())
                    }
                    Some(ServerKeyDecision::Continue) => Ok(()),
                }
            } else {
                Ok(())
            }
        };

        if result.is_ok() {
            self.connected = true;
            self.world
                .lock()
                .senders
                .insert(self.host_id.clone(), (self.hop, self.events.clone()));
        }
        result
    }

    async fn authenticate(
        &mut self,
        _username: &str,
        credentials: &AuthCredentials,
    ) -> Result<(), SshError> {
        let gate = self.world.lock().auth_gates.remove(&self.host_id);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let result = {
            let world = self.world.lock();
            match (world.passwords.get(&self.host_id), credentials) {
                _ if !self.connected => Err(SshError::NotConnected),
                (Some(expected), AuthCredentials::Password(given)) if expected != given => {
                    Err(SshError::Auth("Permission denied".to_string()))
                }
                _ => Ok(()),
            }
        };

        self.world.lock().calls.push(Call::Authenticate {
            host: self.host_id.clone(),
            ok: result.is_ok(),
        });
        self.authenticated = result.is_ok();
        result
    }

    async fn disconnect(&mut self) -> Result<(), SshError> {
        let broken = {
            let mut world = self.world.lock();
            world.calls.push(Call::Disconnect {
                host: self.host_id.clone(),
            });
            world.senders.remove(&self.host_id);
            world.broken_disconnect.contains(&self.host_id)
        };
        self.connected = false;
        self.authenticated = false;
        if broken {
            return Err(SshError::Protocol("broken pipe".to_string()));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// 使用密码认证的测试主机
pub fn host(id: &str) -> HostData {
    HostData {
        id: id.to_string(),
        hostname: format!("{}.example.com", id),
        username: "root".to_string(),
        authentication_method: AuthenticationMethod::Password,
        password: Some("secret".to_string()),
        ..Default::default()
    }
}

pub fn host_with_jumps(id: &str, jumps: &[&str]) -> HostData {
    HostData {
        jump_host_ids: jumps.iter().map(|j| j.to_string()).collect(),
        ..host(id)
    }
}

pub fn hosts_by_id(hosts: &[HostData]) -> HashMap<String, HostData> {
    hosts.iter().map(|h| (h.id.clone(), h.clone())).collect()
}
