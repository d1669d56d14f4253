// shellhop 命令行入口
// 读取本地主机配置，打开一个终端并建立链路，Ctrl-C 时逆序断开

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shellhop::chain::{ChainError, Recovery};
use shellhop::services::storage;
use shellhop::ssh::{ServerKeyDecision, SshClientFactory, SshConfig};
use shellhop::{TerminalEvent, TerminalManager};

#[derive(Parser)]
#[command(name = "shellhop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 目标主机 ID
    #[arg(value_name = "HOST_ID", required_unless_present = "list")]
    host_id: Option<String>,

    /// 遇到未知或变化的主机公钥时自动接受
    #[arg(long, value_enum, value_name = "MODE")]
    accept_host_key: Option<AcceptMode>,

    /// 列出已配置的主机及其跳板机链路
    #[arg(long)]
    list: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AcceptMode {
    /// 仅本次接受
    Once,
    /// 接受并写入 known hosts
    Remember,
}

impl From<AcceptMode> for ServerKeyDecision {
    fn from(mode: AcceptMode) -> Self {
        match mode {
            AcceptMode::Once => ServerKeyDecision::Continue,
            AcceptMode::Remember => ServerKeyDecision::AddAndContinue,
        }
    }
}

fn main() -> Result<()> {
    // 可以通过 RUST_LOG 环境变量控制日志级别，例如：RUST_LOG=debug shellhop <HOST_ID>
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if cli.list {
        return list_hosts();
    }
    let Some(host_id) = cli.host_id.clone() else {
        bail!("HOST_ID is required");
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("ssh-worker")
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(host_id, cli.accept_host_key.map(Into::into)))
}

/// RUST_LOG 未设置或无法解析时默认 info
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn list_hosts() -> Result<()> {
    let config = storage::load_host_config()?;
    for host in &config.hosts {
        let mut hops: Vec<String> = host.effective_jump_host_ids();
        hops.push(host.id.clone());
        println!(
            "{:<12} {:<32} {:<12} {}",
            host.id,
            host.display_name(),
            host.authentication_method.as_str(),
            hops.join(" -> ")
        );
    }
    Ok(())
}

async fn run(host_id: String, accept_host_key: Option<ServerKeyDecision>) -> Result<()> {
    let config = storage::load_host_config()?;
    let settings = storage::load_settings()?;
    let known_hosts = Arc::new(Mutex::new(storage::load_known_hosts()?));

    let factory = SshClientFactory::new(SshConfig::from_settings(&settings.connection), known_hosts);
    let (manager, mut events) = TerminalManager::new(config, factory);

    let entry = manager.open_terminal(&host_id)?;
    let uuid = entry.uuid;
    info!("[Main] Opening {} through {} hop(s)", entry.name, entry.hops.len());

    let mut closing = false;
    let mut accepted_hop = None;
    let mut outcome: Option<ChainError> = None;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c(), if !closing => {
                info!("[Main] Interrupted, closing chain");
                closing = true;
                if let Err(e) = manager.close_terminal(uuid) {
                    warn!("[Main] {}", e);
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    TerminalEvent::HopUpdated { hop, .. } => {
                        info!("[Main] Hop {} {} -> {:?}", hop.index, hop.host_name, hop.status);
                    }
                    TerminalEvent::Established { host_id, .. } => {
                        info!("[Main] Connected to {}, press Ctrl-C to disconnect", host_id);
                        if let Err(e) = storage::update_host_last_connected(&host_id) {
                            warn!("[Main] Failed to update last connected time: {:#}", e);
                        }
                    }
                    TerminalEvent::Failed { error, .. } => {
                        let hop = error.hop();
                        match (error.recovery(), accept_host_key) {
                            (Recovery::AcceptServerKey, Some(decision)) if accepted_hop != hop => {
                                info!("[Main] Accepting server key for hop {:?}", hop);
                                accepted_hop = hop;
                                manager.accept_server_key(uuid, decision)?;
                            }
                            (recovery, _) => {
                                error!("[Main] {} (suggested action: {:?})", error, recovery);
                                outcome = Some(error);
                                closing = true;
                                if let Err(e) = manager.close_terminal(uuid) {
                                    warn!("[Main] {}", e);
                                }
                            }
                        }
                    }
                    TerminalEvent::Closed { error, .. } => {
                        warn!("[Main] {}", error);
                        outcome = Some(error);
                        closing = true;
                    }
                    TerminalEvent::TornDown { .. } => break,
                }
            }
        }
    }

    match outcome {
        Some(error) => Err(error).context(format!("Connection to {} ended", host_id)),
        None => Ok(()),
    }
}
