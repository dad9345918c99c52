use feedlink_core::{ConnectionState, NegotiationRole};
use feedlink_engine::{
    FeedSession, RelayHub, RtcTransportFactory, SessionConfig, TransportConfig,
};
use std::sync::Arc;

use crate::integration::init_tracing;
use crate::utils::{CONNECTION_TIMEOUT_MS, test_feed, video_track, wait_for_state};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_sessions_connect_over_loopback() {
    init_tracing();

    let hub = RelayHub::new();
    let config = SessionConfig {
        transport: TransportConfig::host_only(),
        ..SessionConfig::default()
    };
    let factory = Arc::new(RtcTransportFactory::new(TransportConfig::host_only()));

    let viewer = FeedSession::spawn(
        config.clone(),
        test_feed(),
        NegotiationRole::Answerer,
        Arc::new(hub.clone()),
        factory.clone(),
    )
    .await
    .expect("viewer session");
    let broadcaster = FeedSession::spawn(
        config,
        test_feed(),
        NegotiationRole::Offerer,
        Arc::new(hub.clone()),
        factory,
    )
    .await
    .expect("broadcaster session");

    broadcaster
        .attach_local_media(vec![video_track("camera")])
        .await
        .expect("attach camera");
    broadcaster.start_as_offerer().await.expect("offer");

    wait_for_state(&broadcaster, ConnectionState::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("broadcaster connected");
    wait_for_state(&viewer, ConnectionState::Connected, CONNECTION_TIMEOUT_MS)
        .await
        .expect("viewer connected");

    broadcaster.close().await;
    viewer.close().await;
    assert_eq!(broadcaster.current_state(), ConnectionState::Closed);
}
