// SSH 客户端 Handler 实现
// 实现 russh::client::Handler trait

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use russh::keys::PublicKey;
use tracing::{debug, info, warn};

use super::error::SshError;
use super::event::{DisconnectReason, ServerKeyDecision, SessionEvent, SessionEventSender};
use crate::models::KnownHostsConfig;
use crate::services::storage;

/// 进程内共享的 known hosts
pub type KnownHostsHandle = Arc<Mutex<KnownHostsConfig>>;

/// 主机公钥校验结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKeyVerdict {
    /// 与已保存的指纹一致
    Known,
    /// 仅本次接受
    AcceptedOnce,
    /// 接受并记录
    Learned,
}

/// 校验服务器公钥
pub fn verify_server_key(
    known_hosts: &mut KnownHostsConfig,
    host: &str,
    port: u16,
    key_type: &str,
    fingerprint: &str,
    decision: Option<ServerKeyDecision>,
    strict: bool,
) -> Result<HostKeyVerdict, SshError> {
    let existing = known_hosts
        .find(host, port)
        .map(|entry| entry.fingerprint.clone());

    match (existing, decision) {
        (Some(expected), _) if expected == fingerprint => {
            known_hosts.touch(host, port);
            Ok(HostKeyVerdict::Known)
        }
        (_, Some(ServerKeyDecision::Continue)) => Ok(HostKeyVerdict::AcceptedOnce),
        (_, Some(ServerKeyDecision::AddAndContinue)) => {
            known_hosts.remember(host, port, key_type, fingerprint);
            Ok(HostKeyVerdict::Learned)
        }
        (Some(expected), None) => Err(SshError::ServerKeyMismatch {
            expected,
            actual: fingerprint.to_string(),
        }),
        (None, None) if !strict => {
            known_hosts.remember(host, port, key_type, fingerprint);
            Ok(HostKeyVerdict::Learned)
        }
        (None, None) => Err(SshError::UnknownServerKey {
            algorithm: key_type.to_string(),
            fingerprint: fingerprint.to_string(),
        }),
    }
}

/// SSH 客户端 Handler
/// 每一跳一个实例
pub struct SshClientHandler {
    hop: usize,
    host: String,
    port: u16,
    decision: Option<ServerKeyDecision>,
    strict: bool,
    known_hosts: KnownHostsHandle,
    events: SessionEventSender,
}

impl SshClientHandler {
    pub fn new(
        hop: usize,
        host: String,
        port: u16,
        decision: Option<ServerKeyDecision>,
        strict: bool,
        known_hosts: KnownHostsHandle,
        events: SessionEventSender,
    ) -> Self {
        Self {
            hop,
            host,
            port,
            decision,
            strict,
            known_hosts,
            events,
        }
    }

    fn check(&self, server_public_key: &PublicKey) -> Result<bool, SshError> {
        let fingerprint = server_public_key
            .fingerprint(russh::keys::ssh_key::HashAlg::Sha256)
            .to_string();
        let key_type = server_public_key.algorithm().to_string();

        debug!(
            "[SSH] Hop {} server key {} {}",
            self.hop, key_type, fingerprint
        );

        let (verdict, snapshot) = {
            let mut known_hosts = self.known_hosts.lock();
            let verdict = verify_server_key(
                &mut known_hosts,
                &self.host,
                self.port,
                &key_type,
                &fingerprint,
                self.decision,
                self.strict,
            )?;
            let snapshot = (verdict == HostKeyVerdict::Learned).then(|| known_hosts.clone());
            (verdict, snapshot)
        };

        if let Some(snapshot) = snapshot {
            info!(
                "[SSH] Remembering server key for {}:{} ({})",
                self.host, self.port, fingerprint
            );
            if let Err(e) = storage::save_known_hosts(&snapshot) {
                warn!("[SSH] Failed to persist known hosts: {:#}", e);
            }
        } else if verdict == HostKeyVerdict::AcceptedOnce {
            info!(
                "[SSH] Server key for {}:{} accepted for this connection only",
                self.host, self.port
            );
        }

        Ok(true)
    }
}

impl russh::client::Handler for SshClientHandler {
    type Error = SshError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let result = self.check(server_public_key);
        async move { result }
    }

    fn disconnected(
        &mut self,
        reason: russh::client::DisconnectReason<Self::Error>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let (reason, result) = match reason {
            russh::client::DisconnectReason::ReceivedDisconnect(_) => {
                (DisconnectReason::Server, Ok(()))
            }
            russh::client::DisconnectReason::Error(e) => {
                (DisconnectReason::Error(e.to_string()), Err(e))
            }
        };
        debug!("[SSH] Hop {} disconnected: {}", self.hop, reason);
        let _ = self.events.send(SessionEvent::Disconnected {
            hop: self.hop,
            reason,
        });
        async move { result }
    }
}
