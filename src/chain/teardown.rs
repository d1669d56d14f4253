// 链路拆除：严格按逆序断开

use tracing::{debug, info, warn};

use super::item::{Chain, HopStatus};
use crate::ssh::SessionPrimitive;

/// 从目标主机开始逆序断开每一跳，逐个等待完成
///
/// 后一跳的流量经由前一跳转发，所以必须先断开下游。从未连接的跳直接跳过；
/// 断开失败只记录日志。完成后所有跳回到 Connecting。
pub async fn teardown<S: SessionPrimitive>(chain: &mut Chain<S>) {
    info!("[Teardown] Closing chain of {} hop(s)", chain.len());

    for item in chain.items.iter_mut().rev() {
        if item.status == HopStatus::Connecting && !item.session.is_connected() {
            debug!("[Teardown] Hop {} never connected, skipping", item.hop);
            item.reset();
            continue;
        }

        match item.session.disconnect().await {
            Ok(()) => debug!("[Teardown] Hop {} ({}) disconnected", item.hop, item.host.id),
            Err(e) => warn!(
                "[Teardown] Hop {} ({}) disconnect failed: {}",
                item.hop, item.host.id, e
            ),
        }
        item.reset();
    }
}
