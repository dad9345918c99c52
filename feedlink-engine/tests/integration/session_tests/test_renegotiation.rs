use feedlink_core::{NegotiationRole, SdpType};
use feedlink_engine::{Relay, RelayHub, SessionConfig};
use std::sync::Arc;

use crate::integration::{create_test_session, init_tracing};
use crate::utils::{
    SIGNAL_TIMEOUT_MS, TransportCall, candidate, offer, test_feed, wait_for_document, write_as,
};

#[tokio::test]
async fn test_viewer_answers_a_restarted_broadcast() {
    init_tracing();

    let hub = RelayHub::new();
    let key = test_feed();
    let (viewer, transport) = create_test_session(
        NegotiationRole::Answerer,
        Arc::new(hub.clone()),
        SessionConfig::default(),
    )
    .await;
    let mut relay_view = hub.subscribe(&key).await.expect("subscribe");

    // First attempt.
    write_as(&hub, &key, NegotiationRole::Offerer, offer("offer-1"))
        .await
        .expect("write offer");
    wait_for_document(
        &mut relay_view.snapshots,
        |doc| doc.answer.as_ref().is_some_and(|a| a.sdp == "mock-answer-1"),
        SIGNAL_TIMEOUT_MS,
    )
    .await
    .expect("first answer");

    // Broadcaster restarts: new offer on the same feed.
    write_as(&hub, &key, NegotiationRole::Offerer, offer("offer-2"))
        .await
        .expect("write offer");
    assert!(
        transport.wait_for_connections(2, SIGNAL_TIMEOUT_MS).await,
        "Viewer did not replace its connection"
    );
    wait_for_document(
        &mut relay_view.snapshots,
        |doc| doc.answer.as_ref().is_some_and(|a| a.sdp == "mock-answer-2"),
        SIGNAL_TIMEOUT_MS,
    )
    .await
    .expect("second answer");

    assert_eq!(transport.calls(1).await.last(), Some(&TransportCall::Close));
    assert!(
        transport
            .calls(2)
            .await
            .contains(&TransportCall::SetRemoteDescription(SdpType::Offer))
    );

    hub.unsubscribe(&key, relay_view.id).await;
    viewer.close().await;
}

#[tokio::test]
async fn test_redelivered_offer_is_answered_once() {
    init_tracing();

    let hub = RelayHub::new();
    let key = test_feed();
    let (viewer, transport) = create_test_session(
        NegotiationRole::Answerer,
        Arc::new(hub.clone()),
        SessionConfig::default(),
    )
    .await;

    write_as(&hub, &key, NegotiationRole::Offerer, offer("offer-1"))
        .await
        .expect("write offer");
    assert!(
        transport
            .wait_for_call(1, TransportCall::CreateAnswer, SIGNAL_TIMEOUT_MS)
            .await
    );

    // Later writes carry the same offer field along; none of them is a new attempt.
    let line = "candidate:9 1 udp 1 10.0.0.9 9 typ host";
    write_as(&hub, &key, NegotiationRole::Offerer, candidate(line))
        .await
        .expect("write candidate");
    assert!(
        transport
            .wait_for_call(
                1,
                TransportCall::AddIceCandidate(line.into()),
                SIGNAL_TIMEOUT_MS
            )
            .await
    );

    assert_eq!(transport.connection_count().await, 1);
    let answers = transport
        .calls(1)
        .await
        .into_iter()
        .filter(|c| *c == TransportCall::CreateAnswer)
        .count();
    assert_eq!(answers, 1);

    viewer.close().await;
}
