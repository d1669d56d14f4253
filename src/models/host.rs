// Host, Key 数据结构（持久化用）

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// 认证方式
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum AuthenticationMethod {
    #[default]
    Password,
    PublicKey,
    Certificate,
}

impl AuthenticationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::PublicKey => "publickey",
            Self::Certificate => "certificate",
        }
    }
}

/// 代理类型
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum ProxyType {
    #[default]
    Http,
    Socks5,
}

/// 代理配置（只作用于链路第一跳的 TCP 连接）
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub proxy_type: ProxyType,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 主机数据
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HostData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub authentication_method: AuthenticationMethod,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub key_id: Option<String>,
    /// 跳板机 ID 列表（按连接顺序）
    #[serde(default, deserialize_with = "deserialize_host_ids")]
    pub jump_host_ids: Vec<String>,
    /// 旧版本的单跳板机字段
    #[serde(default, deserialize_with = "deserialize_host_id")]
    pub proxy_jump_id: Option<String>,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default)]
    pub last_connected_at: Option<String>,
}

fn default_port() -> u16 {
    22
}

impl Default for HostData {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
            hostname: String::new(),
            port: default_port(),
            username: String::new(),
            authentication_method: AuthenticationMethod::Password,
            password: None,
            key_id: None,
            jump_host_ids: Vec::new(),
            proxy_jump_id: None,
            proxy: None,
            last_connected_at: None,
        }
    }
}

impl HostData {
    /// 显示名称：优先使用 name，否则为 hostname:port
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}:{}", self.hostname, self.port),
        }
    }

    /// 实际生效的跳板机 ID 列表
    ///
    /// `jump_host_ids` 非空时优先；否则回退到旧的 `proxy_jump_id`。
    pub fn effective_jump_host_ids(&self) -> Vec<String> {
        if !self.jump_host_ids.is_empty() {
            return self.jump_host_ids.clone();
        }
        self.proxy_jump_id.iter().cloned().collect()
    }

    /// 网络端点是否相同（代理不同也视为不同端点）
    pub fn same_endpoint(&self, other: &HostData) -> bool {
        self.hostname == other.hostname && self.port == other.port && self.proxy == other.proxy
    }
}

/// 密钥数据
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct KeyData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// OpenSSH 格式私钥内容
    pub private_key: String,
    #[serde(default)]
    pub passphrase: Option<String>,
    /// OpenSSH 证书内容
    #[serde(default)]
    pub certificate: Option<String>,
}

/// 配置数据（用于存储到文件）
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub hosts: Vec<HostData>,
    #[serde(default)]
    pub keys: Vec<KeyData>,
}

impl HostConfig {
    pub fn find_host(&self, id: &str) -> Option<&HostData> {
        self.hosts.iter().find(|h| h.id == id)
    }

    pub fn hosts_by_id(&self) -> HashMap<String, HostData> {
        self.hosts
            .iter()
            .map(|h| (h.id.clone(), h.clone()))
            .collect()
    }

    pub fn keys_by_id(&self) -> HashMap<String, KeyData> {
        self.keys
            .iter()
            .map(|k| (k.id.clone(), k.clone()))
            .collect()
    }
}

// 旧版本把 ID 存成数字，新版本存成字符串，两种都接受
#[derive(Deserialize)]
#[serde(untagged)]
enum RawHostId {
    Text(String),
    Number(i64),
}

impl RawHostId {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

fn deserialize_host_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let ids = Option::<Vec<RawHostId>>::deserialize(deserializer)?;
    Ok(ids
        .unwrap_or_default()
        .into_iter()
        .map(RawHostId::into_string)
        .collect())
}

fn deserialize_host_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawHostId>::deserialize(deserializer)?.map(RawHostId::into_string))
}
