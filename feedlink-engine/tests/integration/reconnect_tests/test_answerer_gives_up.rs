use feedlink_core::{ConnectionState, NegotiationRole, TransportState};
use feedlink_engine::{ReconnectConfig, RelayHub, SessionConfig};
use std::sync::Arc;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{SIGNAL_TIMEOUT_MS, TransportCall, offer, test_feed, wait_for_state, write_as};

#[tokio::test(start_paused = true)]
async fn test_answerer_waits_for_offerer_then_fails() {
    init_tracing();

    let hub = RelayHub::new();
    let config = SessionConfig {
        reconnect: ReconnectConfig {
            max_attempts: 2,
            disconnect_grace_period_ms: 1_000,
        },
        ..SessionConfig::default()
    };
    let (viewer, transport) =
        create_test_session(NegotiationRole::Answerer, Arc::new(hub.clone()), config).await;

    write_as(&hub, &test_feed(), NegotiationRole::Offerer, offer("offer-1"))
        .await
        .expect("write offer");
    assert!(
        transport
            .wait_for_call(1, TransportCall::CreateAnswer, SIGNAL_TIMEOUT_MS)
            .await
    );
    transport.emit_state(1, TransportState::Connected).await;
    wait_for_state(&viewer, ConnectionState::Connected, SIGNAL_TIMEOUT_MS)
        .await
        .expect("connected");

    // The broadcaster never comes back.
    transport.emit_state(1, TransportState::Disconnected).await;
    wait_for_state(&viewer, ConnectionState::Reconnecting, 5_000)
        .await
        .expect("reconnecting");
    wait_for_state(&viewer, ConnectionState::Failed, 10_000)
        .await
        .expect("failed");

    // The answerer never creates connections of its own.
    assert_eq!(transport.connection_count().await, 1);

    viewer.close().await;
}
