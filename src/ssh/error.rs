// SSH 错误类型定义

use thiserror::Error;

/// SSH 错误类型
#[derive(Debug, Error)]
pub enum SshError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO 错误（网络连接等）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 认证失败
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// SSH 协议错误
    #[error("SSH protocol error: {0}")]
    Protocol(String),

    /// 密钥错误
    #[error("Key error: {0}")]
    Key(String),

    /// 代理错误
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// 连接超时
    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    /// 未知主机公钥，需要用户确认
    #[error("Unknown server key {algorithm} {fingerprint}")]
    UnknownServerKey {
        algorithm: String,
        fingerprint: String,
    },

    /// 主机公钥与已保存的不一致
    #[error("Server key mismatch: expected {expected}, got {actual}")]
    ServerKeyMismatch { expected: String, actual: String },

    /// 会话尚未连接
    #[error("Session is not connected")]
    NotConnected,
}

impl SshError {
    /// 是否可以通过确认主机公钥来恢复
    pub fn is_server_key_error(&self) -> bool {
        matches!(
            self,
            SshError::UnknownServerKey { .. } | SshError::ServerKeyMismatch { .. }
        )
    }
}

impl From<russh::Error> for SshError {
    fn from(e: russh::Error) -> Self {
        SshError::Protocol(e.to_string())
    }
}

impl From<russh::keys::Error> for SshError {
    fn from(e: russh::keys::Error) -> Self {
        SshError::Key(e.to_string())
    }
}
