// SSH 客户端核心实现
// 基于 russh 的会话原语，支持经由上一跳会话的 direct-tcpip 隧道

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{AuthResult, Handle};
use russh::Disconnect;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use super::config::{AuthCredentials, ConnectTarget, SshConfig};
use super::error::SshError;
use super::event::{ServerKeyDecision, SessionEventSender};
use super::handler::{KnownHostsHandle, SshClientHandler};
use super::primitive::{SessionFactory, SessionPrimitive};
use super::proxy::{connect_via_proxy, resolve_addr};
use crate::models::HostData;

/// 单跳 SSH 客户端
pub struct SshClient {
    /// 在链路中的位置
    hop: usize,
    config: SshConfig,
    known_hosts: KnownHostsHandle,
    events: SessionEventSender,
    handle: Option<Handle<SshClientHandler>>,
}

impl SshClient {
    pub fn new(
        hop: usize,
        config: SshConfig,
        known_hosts: KnownHostsHandle,
        events: SessionEventSender,
    ) -> Self {
        Self {
            hop,
            config,
            known_hosts,
            events,
            handle: None,
        }
    }

    /// 获取 Handle 引用（供 shell/sftp 等上层使用）
    pub fn handle(&self) -> Option<&Handle<SshClientHandler>> {
        self.handle.as_ref()
    }

    fn timeout_err(&self) -> SshError {
        SshError::Timeout(self.config.connect_timeout)
    }

    /// 直连（或经由代理）建立 TCP 连接
    async fn open_tcp(&self, target: &ConnectTarget) -> Result<TcpStream, SshError> {
        let connect_timeout = self.config.connect_timeout();
        if let Some(proxy) = &target.proxy {
            return connect_via_proxy(proxy, &target.host, target.port, connect_timeout).await;
        }

        let socket_addr = resolve_addr(&target.host, target.port)?;
        debug!("[SSH] Hop {} connecting to {}...", self.hop, socket_addr);
        timeout(connect_timeout, TcpStream::connect(socket_addr))
            .await
            .map_err(|_| self.timeout_err())?
            .map_err(SshError::Io)
    }
}

fn check_auth_result(result: AuthResult, method: &str) -> Result<(), SshError> {
    match result {
        AuthResult::Success => Ok(()),
        AuthResult::Failure {
            partial_success: true,
            ..
        } => Err(SshError::Auth(
            "Partial authentication - additional auth required".to_string(),
        )),
        AuthResult::Failure {
            remaining_methods, ..
        } => Err(SshError::Auth(format!(
            "{} authentication failed. Server suggests: {:?}",
            method, remaining_methods
        ))),
    }
}

/// 解析私钥，空口令视为无口令
fn decode_private_key(
    private_key: &str,
    passphrase: Option<&str>,
) -> Result<russh::keys::PrivateKey, SshError> {
    let passphrase = passphrase.filter(|p| !p.is_empty());
    russh::keys::decode_secret_key(private_key, passphrase)
        .map_err(|e| SshError::Key(format!("Failed to decode key: {}", e)))
}

#[async_trait]
impl SessionPrimitive for SshClient {
    async fn connect(
        &mut self,
        target: &ConnectTarget,
        tunnel: Option<&Self>,
        decision: Option<ServerKeyDecision>,
    ) -> Result<(), SshError> {
        self.handle = None;

        let connect_timeout = self.config.connect_timeout();
        let russh_config = Arc::new(self.config.to_russh_config());
        let handler = SshClientHandler::new(
            self.hop,
            target.host.clone(),
            target.port,
            decision,
            self.config.strict_host_key_checking,
            self.known_hosts.clone(),
            self.events.clone(),
        );

        let handle = match tunnel {
            Some(upstream) => {
                let upstream = upstream.handle.as_ref().ok_or(SshError::NotConnected)?;
                debug!(
                    "[SSH] Hop {} opening direct-tcpip tunnel to {}:{}",
                    self.hop, target.host, target.port
                );
                let channel = timeout(
                    connect_timeout,
                    upstream.channel_open_direct_tcpip(
                        target.host.clone(),
                        target.port as u32,
                        "127.0.0.1",
                        0,
                    ),
                )
                .await
                .map_err(|_| self.timeout_err())??;

                timeout(
                    connect_timeout,
                    russh::client::connect_stream(russh_config, channel.into_stream(), handler),
                )
                .await
                .map_err(|_| self.timeout_err())??
            }
            None => {
                let stream = self.open_tcp(target).await?;
                timeout(
                    connect_timeout,
                    russh::client::connect_stream(russh_config, stream, handler),
                )
                .await
                .map_err(|_| self.timeout_err())??
            }
        };

        info!(
            "[SSH] Hop {} handshake with {}:{} completed",
            self.hop, target.host, target.port
        );
        self.handle = Some(handle);
        Ok(())
    }

    async fn authenticate(
        &mut self,
        username: &str,
        credentials: &AuthCredentials,
    ) -> Result<(), SshError> {
        let auth_timeout = self.config.connect_timeout();
        let timeout_err = self.timeout_err();
        let handle = self.handle.as_mut().ok_or(SshError::NotConnected)?;

        debug!(
            "[SSH] Authenticating as '{}' using {}",
            username,
            credentials.method_name()
        );

        let result = match credentials {
            AuthCredentials::Password(password) => {
                timeout(auth_timeout, handle.authenticate_password(username, password))
                    .await
                    .map_err(|_| timeout_err)??
            }
            AuthCredentials::PublicKey {
                private_key,
                passphrase,
            } => {
                let key = decode_private_key(private_key, passphrase.as_deref())?;
                let key_with_alg = russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), None);
                timeout(
                    auth_timeout,
                    handle.authenticate_publickey(username, key_with_alg),
                )
                .await
                .map_err(|_| timeout_err)??
            }
            AuthCredentials::Certificate {
                private_key,
                passphrase,
                certificate,
            } => {
                let key = decode_private_key(private_key, passphrase.as_deref())?;
                let cert = russh::keys::Certificate::from_openssh(certificate)
                    .map_err(|e| SshError::Key(format!("Failed to parse certificate: {}", e)))?;
                timeout(
                    auth_timeout,
                    handle.authenticate_openssh_cert(username, Arc::new(key), cert),
                )
                .await
                .map_err(|_| timeout_err)??
            }
        };

        check_auth_result(result, credentials.method_name())
    }

    async fn disconnect(&mut self) -> Result<(), SshError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if handle.is_closed() {
            return Ok(());
        }
        handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_closed())
    }
}

/// 生产环境使用的会话工厂
#[derive(Clone)]
pub struct SshClientFactory {
    config: SshConfig,
    known_hosts: KnownHostsHandle,
}

impl SshClientFactory {
    pub fn new(config: SshConfig, known_hosts: KnownHostsHandle) -> Self {
        Self {
            config,
            known_hosts,
        }
    }
}

impl SessionFactory for SshClientFactory {
    type Session = SshClient;

    fn create(&self, hop: usize, _host: &HostData, events: SessionEventSender) -> SshClient {
        SshClient::new(hop, self.config.clone(), self.known_hosts.clone(), events)
    }
}
