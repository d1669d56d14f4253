// 会话原语抽象
// 链路编排只依赖这里的 trait，不直接接触 russh

use async_trait::async_trait;

use super::config::{AuthCredentials, ConnectTarget};
use super::error::SshError;
use super::event::{ServerKeyDecision, SessionEventSender};
use crate::models::HostData;

/// 到单个主机的传输 + 认证会话
#[async_trait]
pub trait SessionPrimitive: Send + Sync + 'static {
    /// 建立传输并完成握手
    ///
    /// `tunnel` 为上一跳已认证的会话，本跳的流量经由它转发。
    async fn connect(
        &mut self,
        target: &ConnectTarget,
        tunnel: Option<&Self>,
        decision: Option<ServerKeyDecision>,
    ) -> Result<(), SshError>;

    async fn authenticate(
        &mut self,
        username: &str,
        credentials: &AuthCredentials,
    ) -> Result<(), SshError>;

    /// 断开连接；从未连接时为空操作
    async fn disconnect(&mut self) -> Result<(), SshError>;

    fn is_connected(&self) -> bool;
}

/// 为每一跳创建新的、尚未连接的会话
pub trait SessionFactory: Send + Sync + 'static {
    type Session: SessionPrimitive;

    fn create(&self, hop: usize, host: &HostData, events: SessionEventSender) -> Self::Session;
}
