// 链路解析：跳板机 ID 列表 -> 有序链路

use std::collections::HashMap;

use tracing::debug;

use super::error::ChainError;
use super::item::{Chain, ChainItem};
use crate::models::HostData;
use crate::ssh::{SessionEventSender, SessionFactory};

/// 解析目标主机的完整链路
///
/// 顺序为配置的跳板机在前，目标主机最后。任何一个 ID 找不到都直接失败，
/// 不会创建会话，也不产生网络活动。
pub fn resolve<F: SessionFactory>(
    host: &HostData,
    hosts_by_id: &HashMap<String, HostData>,
    factory: &F,
    events: &SessionEventSender,
) -> Result<Chain<F::Session>, ChainError> {
    let jump_host_ids = host.effective_jump_host_ids();

    let mut hosts = Vec::with_capacity(jump_host_ids.len() + 1);
    for id in &jump_host_ids {
        let jump_host = hosts_by_id
            .get(id)
            .ok_or_else(|| ChainError::UnresolvedHost(id.clone()))?;
        hosts.push(jump_host.clone());
    }
    hosts.push(host.clone());

    debug!(
        "[Chain] Resolved {} -> [{}]",
        host.id,
        hosts
            .iter()
            .map(|h| h.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let items = hosts
        .into_iter()
        .enumerate()
        .map(|(hop, host)| {
            let session = factory.create(hop, &host, events.clone());
            ChainItem::new(hop, host, session)
        })
        .collect();

    Ok(Chain { items })
}
