// SSH 连接模块
//
// 模块结构:
// - config: 连接配置 (SshConfig, ConnectTarget, AuthCredentials)
// - error: 错误类型 (SshError)
// - event: 会话事件 (SessionEvent, ServerKeyDecision, DisconnectReason)
// - handler: russh Handler 实现，主机公钥校验
// - proxy: 第一跳的 HTTP / SOCKS5 代理
// - primitive: 会话原语抽象 (SessionPrimitive, SessionFactory)
// - client: 基于 russh 的会话原语实现

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod primitive;
pub mod proxy;

// 公开导出
pub use client::{SshClient, SshClientFactory};
pub use config::{AuthCredentials, ConnectTarget, KeepaliveConfig, ProxyConfig, SshConfig};
pub use error::SshError;
pub use event::{
    DisconnectReason, ServerKeyDecision, SessionEvent, SessionEventReceiver, SessionEventSender,
};
pub use handler::{verify_server_key, HostKeyVerdict, KnownHostsHandle};
pub use primitive::{SessionFactory, SessionPrimitive};
