// 数据模型模块

pub mod host;
pub mod known_hosts;
pub mod settings;

pub use host::{AuthenticationMethod, HostConfig, HostData, KeyData, ProxyConfig, ProxyType};
pub use known_hosts::{KnownHost, KnownHostsConfig};
pub use settings::{AppSettings, ConnectionSettings};
