use feedlink_core::{ConnectionState, NegotiationRole, SessionDescription};
use feedlink_engine::SessionError;
use futures::StreamExt;
use std::sync::Arc;

use crate::integration::{create_test_manager, init_tracing};
use crate::utils::{MockRecordingSink, RecordingEvent, TransportCall, test_feed, video_track};

#[tokio::test]
async fn test_close_is_idempotent() {
    init_tracing();

    let (mut manager, factory, _events) = create_test_manager(NegotiationRole::Offerer).await;
    let recorder = MockRecordingSink::new();
    manager.set_recorder(Arc::new(recorder.clone()));

    manager
        .attach_local_media(vec![video_track("camera")])
        .await
        .expect("attach");
    manager.start_as_offerer().await.expect("offer");

    let states = manager.observe_state();
    manager.close().await;
    manager.close().await;

    assert_eq!(manager.state(), ConnectionState::Closed);
    assert_eq!(
        factory
            .calls(1)
            .await
            .iter()
            .filter(|c| **c == TransportCall::Close)
            .count(),
        1
    );
    assert_eq!(
        recorder.events(),
        vec![
            RecordingEvent::Started {
                feed_key: test_feed(),
                tracks: 1
            },
            RecordingEvent::Stopped {
                feed_key: test_feed()
            },
        ]
    );

    // The state stream ends after Closed.
    let seen: Vec<_> = states.collect().await;
    assert_eq!(
        seen,
        vec![ConnectionState::Negotiating, ConnectionState::Closed]
    );
}

#[tokio::test]
async fn test_operations_after_close_fail_with_closed() {
    init_tracing();

    let (mut manager, _factory, _events) = create_test_manager(NegotiationRole::Offerer).await;
    manager.close().await;

    assert!(matches!(
        manager.start_as_offerer().await,
        Err(SessionError::Closed)
    ));
    assert!(matches!(
        manager.apply_remote_answer(SessionDescription::answer("v=0")).await,
        Err(SessionError::Closed)
    ));
    assert!(matches!(manager.restart(true).await, Err(SessionError::Closed)));
}

#[tokio::test]
async fn test_close_mid_negotiation_from_any_state() {
    init_tracing();

    let (mut manager, _factory, _events) = create_test_manager(NegotiationRole::Answerer).await;
    manager
        .start_as_answerer(SessionDescription::offer("offer-a"))
        .await
        .expect("answer");
    manager.mark_disconnected();
    manager.fail();

    manager.close().await;
    assert_eq!(manager.state(), ConnectionState::Closed);
    assert!(manager.state().is_terminal());
}
