use feedlink_core::{ConnectionState, NegotiationRole, SdpType, TransportState};
use feedlink_engine::{RelayHub, SessionConfig};
use futures::StreamExt;
use std::sync::Arc;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{SIGNAL_TIMEOUT_MS, TransportCall, wait_for_state};

const REMOTE_CANDIDATE: &str = "candidate:1 1 udp 2122260223 192.168.1.20 53000 typ host";

#[tokio::test]
async fn test_offerer_and_answerer_negotiate_over_relay() {
    init_tracing();

    let hub = RelayHub::new();
    let (viewer, viewer_transport) = create_test_session(
        NegotiationRole::Answerer,
        Arc::new(hub.clone()),
        SessionConfig::default(),
    )
    .await;
    let (broadcaster, broadcaster_transport) = create_test_session(
        NegotiationRole::Offerer,
        Arc::new(hub.clone()),
        SessionConfig::default(),
    )
    .await;
    let viewer_states = viewer.observe_state();

    // Broadcaster offers, viewer answers on its own.
    let offer = broadcaster.start_as_offerer().await.expect("offer");
    assert_eq!(offer.sdp_type, SdpType::Offer);

    assert!(
        viewer_transport
            .wait_for_call(1, TransportCall::CreateAnswer, SIGNAL_TIMEOUT_MS)
            .await,
        "Viewer never answered the offer"
    );
    assert!(
        broadcaster_transport
            .wait_for_call(
                1,
                TransportCall::SetRemoteDescription(SdpType::Answer),
                SIGNAL_TIMEOUT_MS
            )
            .await,
        "Broadcaster never applied the answer"
    );

    // Viewer trickles a candidate, broadcaster applies it.
    viewer_transport.emit_candidate(1, REMOTE_CANDIDATE).await;
    assert!(
        broadcaster_transport
            .wait_for_call(
                1,
                TransportCall::AddIceCandidate(REMOTE_CANDIDATE.into()),
                SIGNAL_TIMEOUT_MS
            )
            .await,
        "Candidate was not relayed"
    );

    viewer_transport
        .emit_state(1, TransportState::Connected)
        .await;
    broadcaster_transport
        .emit_state(1, TransportState::Connected)
        .await;

    wait_for_state(&viewer, ConnectionState::Connected, SIGNAL_TIMEOUT_MS)
        .await
        .expect("viewer connected");
    wait_for_state(&broadcaster, ConnectionState::Connected, SIGNAL_TIMEOUT_MS)
        .await
        .expect("broadcaster connected");

    let seen: Vec<_> = viewer_states.take(3).collect().await;
    assert_eq!(
        seen,
        vec![
            ConnectionState::New,
            ConnectionState::Negotiating,
            ConnectionState::Connected
        ]
    );

    // Each side used exactly one connection.
    assert_eq!(viewer_transport.connection_count().await, 1);
    assert_eq!(broadcaster_transport.connection_count().await, 1);

    viewer.close().await;
    broadcaster.close().await;
}

#[tokio::test]
async fn test_answer_written_before_viewer_joined_is_picked_up() {
    init_tracing();

    let hub = RelayHub::new();
    let (broadcaster, _broadcaster_transport) = create_test_session(
        NegotiationRole::Offerer,
        Arc::new(hub.clone()),
        SessionConfig::default(),
    )
    .await;
    broadcaster.start_as_offerer().await.expect("offer");

    // Viewer subscribes late: the offer reaches it through the current snapshot.
    let (viewer, viewer_transport) = create_test_session(
        NegotiationRole::Answerer,
        Arc::new(hub.clone()),
        SessionConfig::default(),
    )
    .await;

    assert!(
        viewer_transport
            .wait_for_call(
                1,
                TransportCall::SetLocalDescription(SdpType::Answer),
                SIGNAL_TIMEOUT_MS
            )
            .await,
        "Late viewer did not answer the stored offer"
    );

    viewer.close().await;
    broadcaster.close().await;
}
