// Known Hosts 数据模型
// 用于存储和验证 SSH 服务器公钥指纹

use serde::{Deserialize, Serialize};

/// 已知主机条目
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct KnownHost {
    /// 主机地址（host:port 格式）
    pub host: String,
    /// 密钥类型（ssh-ed25519, ssh-rsa 等）
    pub key_type: String,
    /// SHA256 指纹
    pub fingerprint: String,
    /// 首次连接时间
    pub first_seen: String,
    /// 最后使用时间
    pub last_used: String,
}

/// Known Hosts 配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct KnownHostsConfig {
    #[serde(default)]
    pub hosts: Vec<KnownHost>,
}

/// 生成 host:port 形式的键
pub fn host_key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()
}

impl KnownHostsConfig {
    pub fn find(&self, host: &str, port: u16) -> Option<&KnownHost> {
        let key = host_key(host, port);
        self.hosts.iter().find(|h| h.host == key)
    }

    /// 记录（或覆盖）主机公钥
    pub fn remember(&mut self, host: &str, port: u16, key_type: &str, fingerprint: &str) {
        let key = host_key(host, port);
        let now = now();
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.host == key) {
            existing.key_type = key_type.to_string();
            existing.fingerprint = fingerprint.to_string();
            existing.last_used = now;
        } else {
            self.hosts.push(KnownHost {
                host: key,
                key_type: key_type.to_string(),
                fingerprint: fingerprint.to_string(),
                first_seen: now.clone(),
                last_used: now,
            });
        }
    }

    /// 更新最后使用时间
    pub fn touch(&mut self, host: &str, port: u16) {
        let key = host_key(host, port);
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.host == key) {
            existing.last_used = now();
        }
    }
}
