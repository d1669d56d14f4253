// 链路建立：逐跳推进 Connecting -> Connected -> Authenticated
// 可重入，已认证的跳直接跳过，从第一个未认证的跳继续

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::ChainError;
use super::item::{Chain, ChainItem, HopStatus, HopSnapshot};
use crate::models::{AuthenticationMethod, HostData, KeyData};
use crate::ssh::{AuthCredentials, ConnectTarget, SessionPrimitive, SshError};

/// 按主机配置的认证方式组装凭据
pub fn resolve_credentials(
    host: &HostData,
    keys_by_id: &HashMap<String, KeyData>,
) -> Result<AuthCredentials, SshError> {
    let find_key = || -> Result<&KeyData, SshError> {
        let key_id = host
            .key_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SshError::Config(format!("No key configured for {}", host.id)))?;
        keys_by_id
            .get(key_id)
            .ok_or_else(|| SshError::Key(format!("Key {} not found", key_id)))
    };

    match host.authentication_method {
        AuthenticationMethod::Password => host
            .password
            .clone()
            .map(AuthCredentials::Password)
            .ok_or_else(|| SshError::Config(format!("No password configured for {}", host.id))),
        AuthenticationMethod::PublicKey => {
            let key = find_key()?;
            Ok(AuthCredentials::PublicKey {
                private_key: key.private_key.clone(),
                passphrase: key.passphrase.clone(),
            })
        }
        AuthenticationMethod::Certificate => {
            let key = find_key()?;
            let certificate = key
                .certificate
                .clone()
                .filter(|c| !c.is_empty())
                .ok_or_else(|| SshError::Key(format!("Key {} has no certificate", key.id)))?;
            Ok(AuthCredentials::Certificate {
                private_key: key.private_key.clone(),
                passphrase: key.passphrase.clone(),
                certificate,
            })
        }
    }
}

fn fail<S, U>(item: &mut ChainItem<S>, error: ChainError, on_hop_update: &mut U) -> ChainError
where
    U: FnMut(HopSnapshot),
{
    warn!("[Chain] {}", error);
    item.error = Some(error.clone());
    on_hop_update(item.snapshot());
    error
}

/// 推进整条链路直到目标主机认证完成
///
/// 每次状态变化后立即调用 `on_hop_update`，再进行下一步。任何一跳失败都会
/// 记录在该跳上并停止，已认证的上游会话保持打开。成功时返回目标主机的会话。
pub async fn establish<'c, S, U>(
    chain: &'c mut Chain<S>,
    keys_by_id: &HashMap<String, KeyData>,
    mut on_hop_update: U,
) -> Result<&'c S, ChainError>
where
    S: SessionPrimitive,
    U: FnMut(HopSnapshot) + Send,
{
    for index in 0..chain.items.len() {
        let (upstream, rest) = chain.items.split_at_mut(index);
        let item = &mut rest[0];

        if item.status == HopStatus::Authenticated {
            debug!("[Chain] Hop {} ({}) already authenticated", index, item.host.id);
            continue;
        }

        if item.status == HopStatus::Connecting {
            if item.session.is_connected() {
                debug!("[Chain] Hop {} dropping stale session before reconnect", index);
                if let Err(e) = item.session.disconnect().await {
                    warn!("[Chain] Hop {} stale session disconnect failed: {}", index, e);
                }
            }

            let target = ConnectTarget::from_host(&item.host);
            let tunnel = upstream.last().map(|prev| &prev.session);
            info!(
                "[Chain] Hop {} connecting to {}:{}{}",
                index,
                target.host,
                target.port,
                if tunnel.is_some() { " (tunneled)" } else { "" }
            );

            let decision = item.pending_server_key_decision;
            if let Err(cause) = item.session.connect(&target, tunnel, decision).await {
                let error = ChainError::HopConnectFailed {
                    hop: index,
                    host_id: item.host.id.clone(),
                    cause: Arc::new(cause),
                };
                return Err(fail(item, error, &mut on_hop_update));
            }

            item.status = item.status.advance();
            item.pending_server_key_decision = None;
            item.error = None;
            info!("[Chain] Hop {} ({}) connected", index, item.host.id);
            on_hop_update(item.snapshot());
        }

        let credentials = match resolve_credentials(&item.host, keys_by_id) {
            Ok(credentials) => credentials,
            Err(cause) => {
                let error = ChainError::HopAuthFailed {
                    hop: index,
                    host_id: item.host.id.clone(),
                    cause: Arc::new(cause),
                };
                return Err(fail(item, error, &mut on_hop_update));
            }
        };

        debug!(
            "[Chain] Hop {} authenticating as {} via {}",
            index,
            item.host.username,
            credentials.method_name()
        );
        if let Err(cause) = item
            .session
            .authenticate(&item.host.username, &credentials)
            .await
        {
            let error = ChainError::HopAuthFailed {
                hop: index,
                host_id: item.host.id.clone(),
                cause: Arc::new(cause),
            };
            return Err(fail(item, error, &mut on_hop_update));
        }

        item.status = item.status.advance();
        item.error = None;
        info!("[Chain] Hop {} ({}) authenticated", index, item.host.id);
        on_hop_update(item.snapshot());
    }

    Ok(&chain.target().session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::resolve;
    use crate::chain::testing::{
        auth, connect, host, host_with_jumps, hosts_by_id, Call, MockFactory, MockSession,
    };
    use crate::ssh::ServerKeyDecision;
    use tokio::sync::mpsc;

    fn abc_chain(factory: &MockFactory) -> Chain<MockSession> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let hosts = hosts_by_id(&[host("a"), host("b")]);
        resolve(&host_with_jumps("c", &["a", "b"]), &hosts, factory, &tx).unwrap()
    }

    fn statuses(chain: &Chain<MockSession>) -> Vec<HopStatus> {
        chain.items().iter().map(|i| i.status()).collect()
    }

    #[tokio::test]
    async fn test_single_hop_chain() {
        let factory = MockFactory::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut chain = resolve(&host("a"), &HashMap::new(), &factory, &tx).unwrap();

        let session = establish(&mut chain, &HashMap::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(session.host_id(), "a");
        assert!(session.is_authenticated());
        assert_eq!(factory.calls(), vec![connect("a", None), auth("a", true)]);
    }

    #[tokio::test]
    async fn test_hops_are_established_in_order() {
        let factory = MockFactory::default();
        let mut chain = abc_chain(&factory);

        let mut updates = Vec::new();
        establish(&mut chain, &HashMap::new(), |s| {
            updates.push((s.index, s.status))
        })
        .await
        .unwrap();

        assert_eq!(
            factory.calls(),
            vec![
                connect("a", None),
                auth("a", true),
                connect("b", Some("a")),
                auth("b", true),
                connect("c", Some("b")),
                auth("c", true),
            ]
        );
        assert_eq!(
            updates,
            vec![
                (0, HopStatus::Connected),
                (0, HopStatus::Authenticated),
                (1, HopStatus::Connected),
                (1, HopStatus::Authenticated),
                (2, HopStatus::Connected),
                (2, HopStatus::Authenticated),
            ]
        );
        assert!(chain.is_established());
    }

    #[tokio::test]
    async fn test_auth_failure_stops_at_failed_hop() {
        let factory = MockFactory::default();
        factory.require_password("b", "correct");
        let mut chain = abc_chain(&factory);

        let mut updates = Vec::new();
        let err = establish(&mut chain, &HashMap::new(), |s| updates.push(s))
            .await
            .map(|_| ())
            .unwrap_err();

        match &err {
            ChainError::HopAuthFailed { hop, host_id, .. } => {
                assert_eq!(*hop, 1);
                assert_eq!(host_id, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            statuses(&chain),
            vec![
                HopStatus::Authenticated,
                HopStatus::Connected,
                HopStatus::Connecting
            ]
        );
        assert!(chain.items()[0].session().is_connected());
        assert!(chain.items()[1].error().is_some());
        assert!(!factory
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Connect { host, .. } if host == "c")));

        // 失败也会通知观察者
        let last = updates.last().unwrap();
        assert_eq!(last.index, 1);
        assert!(last.error.is_some());
    }

    #[tokio::test]
    async fn test_retry_resumes_at_failed_hop() {
        let factory = MockFactory::default();
        factory.require_password("b", "correct");
        let mut chain = abc_chain(&factory);
        assert!(establish(&mut chain, &HashMap::new(), |_| {}).await.is_err());
        factory.clear_calls();

        let mut fixed = chain.items()[1].host().clone();
        fixed.password = Some("correct".to_string());
        chain.current_item_mut().unwrap().replace_host(fixed);

        let session = establish(&mut chain, &HashMap::new(), |_| {})
            .await
            .unwrap();
        assert_eq!(session.host_id(), "c");

        // b 已连接，只需重新认证；a 不再被触碰
        assert_eq!(
            factory.calls(),
            vec![auth("b", true), connect("c", Some("b")), auth("c", true)]
        );
        assert!(chain.is_established());
        assert!(chain.items()[1].error().is_none());
    }

    #[tokio::test]
    async fn test_unknown_server_key_then_accept() {
        let factory = MockFactory::default();
        factory.unknown_key("b");
        let mut chain = abc_chain(&factory);

        let err = establish(&mut chain, &HashMap::new(), |_| {})
            .await
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err.hop(), Some(1));
        assert_eq!(err.recovery(), crate::chain::Recovery::AcceptServerKey);
        assert_eq!(chain.items()[1].status(), HopStatus::Connecting);
        factory.clear_calls();

        chain
            .current_item_mut()
            .unwrap()
            .set_server_key_decision(Some(ServerKeyDecision::AddAndContinue));
        establish(&mut chain, &HashMap::new(), |_| {})
            .await
            .unwrap();

        assert_eq!(
            factory.calls()[0],
            Call::Connect {
                host: "b".to_string(),
                via: Some("a".to_string()),
                decision: Some(ServerKeyDecision::AddAndContinue),
            }
        );
        assert!(chain.items()[1].pending_server_key_decision().is_none());
    }

    #[tokio::test]
    async fn test_established_chain_is_noop() {
        let factory = MockFactory::default();
        let mut chain = abc_chain(&factory);
        establish(&mut chain, &HashMap::new(), |_| {}).await.unwrap();
        factory.clear_calls();

        let mut updates = 0;
        establish(&mut chain, &HashMap::new(), |_| updates += 1)
            .await
            .unwrap();
        assert!(factory.calls().is_empty());
        assert_eq!(updates, 0);
    }

    #[tokio::test]
    async fn test_reset_hop_reconnects_stale_session() {
        let factory = MockFactory::default();
        factory.require_password("c", "correct");
        let mut chain = abc_chain(&factory);
        assert!(establish(&mut chain, &HashMap::new(), |_| {}).await.is_err());
        factory.clear_calls();

        let mut moved = chain.target().host().clone();
        moved.hostname = "c2.example.com".to_string();
        moved.password = Some("correct".to_string());
        chain.current_item_mut().unwrap().replace_host(moved);
        assert_eq!(chain.target().status(), HopStatus::Connecting);

        establish(&mut chain, &HashMap::new(), |_| {}).await.unwrap();
        assert_eq!(
            factory.calls(),
            vec![
                crate::chain::testing::disconnect("c"),
                connect("c", Some("b")),
                auth("c", true),
            ]
        );
    }

    #[test]
    fn test_resolve_credentials() {
        let keys: HashMap<_, _> = [KeyData {
            id: "k1".to_string(),
            private_key: "PEM".to_string(),
            passphrase: Some("pp".to_string()),
            certificate: None,
            ..Default::default()
        }]
        .into_iter()
        .map(|k| (k.id.clone(), k))
        .collect();

        let mut h = host("a");
        assert!(matches!(
            resolve_credentials(&h, &keys),
            Ok(AuthCredentials::Password(p)) if p == "secret"
        ));

        h.authentication_method = AuthenticationMethod::PublicKey;
        h.key_id = Some("k1".to_string());
        match resolve_credentials(&h, &keys).unwrap() {
            AuthCredentials::PublicKey {
                private_key,
                passphrase,
            } => {
                assert_eq!(private_key, "PEM");
                assert_eq!(passphrase.as_deref(), Some("pp"));
            }
            other => panic!("unexpected credentials: {other:?}"),
        }

        h.authentication_method = AuthenticationMethod::Certificate;
        assert!(matches!(
            resolve_credentials(&h, &keys),
            Err(SshError::Key(_))
        ));

        h.key_id = Some("missing".to_string());
        h.authentication_method = AuthenticationMethod::PublicKey;
        assert!(matches!(
            resolve_credentials(&h, &keys),
            Err(SshError::Key(_))
        ));

        h.key_id = None;
        assert!(matches!(
            resolve_credentials(&h, &keys),
            Err(SshError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_connect_stops_chain() {
        let factory = MockFactory::default();
        factory.refuse_connect("b");
        let mut chain = abc_chain(&factory);

        let mut updates = Vec::new();
        let err = establish(&mut chain, &HashMap::new(), |s| updates.push(s))
            .await
            .map(|_| ())
            .unwrap_err();

        match &err {
            ChainError::HopConnectFailed { hop, host_id, cause } => {
                assert_eq!(*hop, 1);
                assert_eq!(host_id, "b");
                assert!(!cause.is_server_key_error());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.recovery(), crate::chain::Recovery::Retry);
        assert_eq!(
            factory.calls(),
            vec![connect("a", None), auth("a", true), connect("b", Some("a"))]
        );
        assert_eq!(
            statuses(&chain),
            vec![
                HopStatus::Authenticated,
                HopStatus::Connecting,
                HopStatus::Connecting
            ]
        );
        assert!(chain.items()[1].error().is_some());
        assert!(chain.items()[2].error().is_none());
        assert_eq!(updates.last().map(|s| s.index), Some(1));
        assert!(updates.last().is_some_and(|s| s.error.is_some()));
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_failure() {
        let factory = MockFactory::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut a = host("a");
        a.authentication_method = AuthenticationMethod::PublicKey;
        a.key_id = Some("gone".to_string());
        let mut chain = resolve(&a, &HashMap::new(), &factory, &tx).unwrap();

        let err = establish(&mut chain, &HashMap::new(), |_| {})
            .await
            .map(|_| ())
            .unwrap_err();
        assert_eq!(err.recovery(), crate::chain::Recovery::ReenterCredentials);
        assert_eq!(chain.target().status(), HopStatus::Connected);
        assert_eq!(factory.calls(), vec![connect("a", None)]);
    }
}
