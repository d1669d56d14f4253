// 本地数据持久化服务

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{AppSettings, HostConfig, KnownHostsConfig};

/// 获取配置目录路径
/// macOS: ~/Library/Application Support/shellhop
/// Linux: ~/.config/shellhop
/// Windows: C:\Users\<用户名>\AppData\Roaming\shellhop
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Unable to locate system config directory")?
        .join("shellhop");
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir).context("Unable to create config directory")?;
    }
    Ok(config_dir)
}

/// 读取 JSON 文件，不存在时返回默认值
fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Unable to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Unable to parse {}", path.display()))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("Unable to serialize {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("Unable to write {}", path.display()))?;
    Ok(())
}

// ======================== Hosts / Keys ========================

pub fn get_hosts_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("hosts.json"))
}

/// 加载主机与密钥配置
pub fn load_host_config() -> Result<HostConfig> {
    load_json(&get_hosts_file()?)
}

pub fn save_host_config(config: &HostConfig) -> Result<()> {
    save_json(&get_hosts_file()?, config)
}

fn stamp_last_connected(config: &mut HostConfig, host_id: &str) -> bool {
    match config.hosts.iter_mut().find(|h| h.id == host_id) {
        Some(host) => {
            host.last_connected_at =
                Some(chrono::Local::now().format("%Y-%m-%d %H:%M").to_string());
            true
        }
        None => false,
    }
}

/// 更新主机的最后连接时间
pub fn update_host_last_connected(host_id: &str) -> Result<()> {
    let mut config = load_host_config()?;
    if stamp_last_connected(&mut config, host_id) {
        save_host_config(&config)?;
    }
    Ok(())
}

// ======================== Settings ========================

pub fn get_settings_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("settings.json"))
}

pub fn load_settings() -> Result<AppSettings> {
    load_json(&get_settings_file()?)
}

pub fn save_settings(settings: &AppSettings) -> Result<()> {
    save_json(&get_settings_file()?, settings)
}

// ======================== Known Hosts ========================

pub fn get_known_hosts_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("known_hosts.json"))
}

pub fn load_known_hosts() -> Result<KnownHostsConfig> {
    load_json(&get_known_hosts_file()?)
}

pub fn save_known_hosts(config: &KnownHostsConfig) -> Result<()> {
    save_json(&get_known_hosts_file()?, config)
}
