// SSH 连接配置

use std::fmt;
use std::time::Duration;

use crate::models::{self, ConnectionSettings, HostData, ProxyType};

/// 会话级配置（所有跳共用）
#[derive(Clone, Debug)]
pub struct SshConfig {
    /// 连接/认证超时（秒）
    pub connect_timeout: u64,
    /// 不活动超时（秒）
    pub inactivity_timeout: u64,
    /// 心跳配置
    pub keepalive: KeepaliveConfig,
    /// 未知主机公钥是否需要确认
    pub strict_host_key_checking: bool,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self::from_settings(&ConnectionSettings::default())
    }
}

/// 心跳配置
#[derive(Clone, Debug)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    pub interval: u64,
    pub max_retries: u32,
}

impl SshConfig {
    pub fn from_settings(settings: &ConnectionSettings) -> Self {
        Self {
            connect_timeout: settings.connection_timeout_secs as u64,
            inactivity_timeout: settings.inactivity_timeout_secs as u64,
            keepalive: KeepaliveConfig {
                enabled: settings.keepalive_interval_secs > 0,
                interval: settings.keepalive_interval_secs as u64,
                max_retries: settings.keepalive_max,
            },
            strict_host_key_checking: settings.strict_host_key_checking,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// 构建 russh 配置
    pub fn to_russh_config(&self) -> russh::client::Config {
        let mut config = russh::client::Config::default();
        if self.inactivity_timeout > 0 {
            config.inactivity_timeout = Some(Duration::from_secs(self.inactivity_timeout));
        }
        if self.keepalive.enabled {
            config.keepalive_interval = Some(Duration::from_secs(self.keepalive.interval));
            config.keepalive_max = self.keepalive.max_retries as usize;
        }
        config.nodelay = true;
        config
    }
}

/// 代理配置（运行时）
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub proxy_type: ProxyType,
    pub host: String,
    pub port: u16,
    /// 认证信息（用户名, 密码）
    pub auth: Option<(String, String)>,
}

impl ProxyConfig {
    /// 从持久化配置转换，未启用时返回 None
    pub fn from_model(proxy: &models::ProxyConfig) -> Option<Self> {
        if !proxy.enabled || proxy.host.is_empty() {
            return None;
        }
        let auth = match (&proxy.username, &proxy.password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user.clone(), pass.clone())),
            _ => None,
        };
        Some(Self {
            proxy_type: proxy.proxy_type,
            host: proxy.host.clone(),
            port: proxy.port,
            auth,
        })
    }
}

/// 单跳的连接目标
#[derive(Clone, Debug)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
    /// 只在没有上游隧道时使用
    pub proxy: Option<ProxyConfig>,
}

impl ConnectTarget {
    pub fn from_host(host: &HostData) -> Self {
        Self {
            host: host.hostname.clone(),
            port: host.port,
            proxy: host.proxy.as_ref().and_then(ProxyConfig::from_model),
        }
    }
}

/// 认证凭据
#[derive(Clone)]
pub enum AuthCredentials {
    Password(String),
    PublicKey {
        /// OpenSSH 私钥内容
        private_key: String,
        passphrase: Option<String>,
    },
    Certificate {
        private_key: String,
        passphrase: Option<String>,
        /// OpenSSH 证书内容
        certificate: String,
    },
}

impl AuthCredentials {
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PublicKey { .. } => "publickey",
            Self::Certificate { .. } => "certificate",
        }
    }
}

// 不输出凭据内容
impl fmt::Debug for AuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredentials")
            .field("method", &self.method_name())
            .finish_non_exhaustive()
    }
}
