// 代理连接模块
// 链路第一跳可以经由 HTTP CONNECT 或 SOCKS5 代理建立 TCP 连接

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::config::ProxyConfig;
use super::error::SshError;
use crate::models::ProxyType;

/// 解析 host:port
pub(crate) fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr, SshError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|e| SshError::Config(format!("Failed to resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| SshError::Config(format!("No address found for {}:{}", host, port)))
}

/// 通过代理连接到目标主机
pub async fn connect_via_proxy(
    proxy: &ProxyConfig,
    target_host: &str,
    target_port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, SshError> {
    let proxy_addr = resolve_addr(&proxy.host, proxy.port)
        .map_err(|e| SshError::Proxy(e.to_string()))?;

    debug!(
        "[SSH] Connecting to {}:{} via {:?} proxy {}",
        target_host, target_port, proxy.proxy_type, proxy_addr
    );

    let pending = async {
        match proxy.proxy_type {
            ProxyType::Socks5 => socks5(proxy_addr, proxy, target_host, target_port).await,
            ProxyType::Http => http_connect(proxy_addr, proxy, target_host, target_port).await,
        }
    };

    timeout(connect_timeout, pending)
        .await
        .map_err(|_| SshError::Proxy(format!("{:?} proxy connection timeout", proxy.proxy_type)))?
}

async fn socks5(
    proxy_addr: SocketAddr,
    proxy: &ProxyConfig,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream, SshError> {
    use tokio_socks::tcp::Socks5Stream;

    let target = (target_host, target_port);
    let stream = match &proxy.auth {
        Some((username, password)) => {
            Socks5Stream::connect_with_password(proxy_addr, target, username, password).await
        }
        None => Socks5Stream::connect(proxy_addr, target).await,
    }
    .map_err(|e| SshError::Proxy(format!("SOCKS5 proxy connection failed: {}", e)))?;

    Ok(stream.into_inner())
}

async fn http_connect(
    proxy_addr: SocketAddr,
    proxy: &ProxyConfig,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream, SshError> {
    use async_http_proxy::{http_connect_tokio, http_connect_tokio_with_basic_auth};

    let mut stream = TcpStream::connect(proxy_addr)
        .await
        .map_err(|e| SshError::Proxy(format!("Failed to connect to HTTP proxy: {}", e)))?;

    match &proxy.auth {
        Some((username, password)) => {
            http_connect_tokio_with_basic_auth(
                &mut stream,
                target_host,
                target_port,
                username,
                password,
            )
            .await
        }
        None => http_connect_tokio(&mut stream, target_host, target_port).await,
    }
    .map_err(|e| SshError::Proxy(format!("HTTP CONNECT tunnel failed: {}", e)))?;

    Ok(stream)
}
