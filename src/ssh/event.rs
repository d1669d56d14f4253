// SSH 会话事件定义

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 未知/变化主机公钥的处理决定
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerKeyDecision {
    /// 仅本次接受
    Continue,
    /// 接受并写入 known hosts
    AddAndContinue,
}

/// 断开原因
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "message")]
pub enum DisconnectReason {
    /// 服务器主动断开
    Server,
    /// 传输层错误
    Error(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server => write!(f, "closed by server"),
            Self::Error(e) => write!(f, "{}", e),
        }
    }
}

/// 会话事件（底层连接独立于显式 disconnect 断开时发出）
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Disconnected { hop: usize, reason: DisconnectReason },
}

pub type SessionEventSender = mpsc::UnboundedSender<SessionEvent>;
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;
