// Settings 配置数据结构

use serde::{Deserialize, Serialize};

/// 应用设置（持久化用）
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub connection: ConnectionSettings,
}

// ======================== 连接设置 ========================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// 单跳连接/认证超时
    pub connection_timeout_secs: u32,
    /// 心跳间隔，0 表示关闭
    pub keepalive_interval_secs: u32,
    pub keepalive_max: u32,
    pub inactivity_timeout_secs: u32,
    /// 未知主机公钥是否需要确认
    pub strict_host_key_checking: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 30,
            keepalive_interval_secs: 5,
            keepalive_max: 3,
            inactivity_timeout_secs: 60 * 30,
            strict_host_key_checking: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_fill_defaults() {
        let settings: AppSettings =
            serde_json::from_str(r#"{"connection":{"connection_timeout_secs":10}}"#).unwrap();
        assert_eq!(settings.connection.connection_timeout_secs, 10);
        assert_eq!(settings.connection.keepalive_interval_secs, 5);
        assert!(settings.connection.strict_host_key_checking);

        let empty: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.connection, ConnectionSettings::default());
    }
}
