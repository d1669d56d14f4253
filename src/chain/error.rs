// 链路错误类型定义

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::ssh::SshError;

/// 链路编排错误
///
/// 需要同时记录在 ChainItem 上并返回给调用方，所以实现了 Clone，
/// 底层的 SshError 用 Arc 共享。
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// 配置的跳板机 ID 找不到对应主机
    #[error("Unresolved host: {0}")]
    UnresolvedHost(String),

    /// 某一跳连接失败（包括未知主机公钥）
    #[error("Hop {hop} ({host_id}) failed to connect: {cause}")]
    HopConnectFailed {
        hop: usize,
        host_id: String,
        cause: Arc<SshError>,
    },

    /// 某一跳认证失败
    #[error("Hop {hop} ({host_id}) failed to authenticate: {cause}")]
    HopAuthFailed {
        hop: usize,
        host_id: String,
        cause: Arc<SshError>,
    },

    /// 链路建立完成后传输断开
    #[error("Chain closed")]
    ChainClosed,

    #[error("Terminal not found: {0}")]
    TerminalNotFound(Uuid),

    /// 同一链路上已有一次建立过程在进行
    #[error("Establishment already in progress")]
    EstablishInFlight,
}

/// 界面应当提供的恢复操作
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// 确认主机公钥后重连
    AcceptServerKey,
    /// 重新输入凭据
    ReenterCredentials,
    /// 直接重试
    Retry,
    None,
}

impl ChainError {
    /// 出错的跳序号
    pub fn hop(&self) -> Option<usize> {
        match self {
            Self::HopConnectFailed { hop, .. } | Self::HopAuthFailed { hop, .. } => Some(*hop),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&SshError> {
        match self {
            Self::HopConnectFailed { cause, .. } | Self::HopAuthFailed { cause, .. } => {
                Some(cause.as_ref())
            }
            _ => None,
        }
    }

    pub fn recovery(&self) -> Recovery {
        match self {
            Self::HopConnectFailed { cause, .. } if cause.is_server_key_error() => {
                Recovery::AcceptServerKey
            }
            Self::HopConnectFailed { .. } => Recovery::Retry,
            Self::HopAuthFailed { .. } => Recovery::ReenterCredentials,
            Self::UnresolvedHost(_)
            | Self::ChainClosed
            | Self::TerminalNotFound(_)
            | Self::EstablishInFlight => Recovery::None,
        }
    }
}
