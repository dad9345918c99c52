use crate::error::{SessionError, SessionResult};
use crate::media::{LocalTrack, RemoteTrack};
use crate::negotiation::StateObserver;
use crate::session::session_command::SessionCommand;
use feedlink_core::{ConnectionState, FeedKey, NegotiationRole, SessionDescription};
use futures::stream::BoxStream;
use tokio::sync::{mpsc, oneshot};

/// Caller-side handle to a running [`FeedSession`](crate::session::FeedSession).
///
/// Clones talk to the same session. The session closes itself once every clone is dropped.
#[derive(Clone)]
pub struct FeedSessionHandle {
    feed_key: FeedKey,
    role: NegotiationRole,
    command_tx: mpsc::Sender<SessionCommand>,
    observer: StateObserver,
}

impl FeedSessionHandle {
    pub(crate) fn new(
        feed_key: FeedKey,
        role: NegotiationRole,
        command_tx: mpsc::Sender<SessionCommand>,
        observer: StateObserver,
    ) -> Self {
        Self {
            feed_key,
            role,
            command_tx,
            observer,
        }
    }

    pub fn feed_key(&self) -> &FeedKey {
        &self.feed_key
    }

    pub fn role(&self) -> NegotiationRole {
        self.role
    }

    pub async fn attach_local_media(&self, tracks: Vec<LocalTrack>) -> SessionResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::AttachLocalMedia { tracks, reply }, rx)
            .await?
    }

    /// Creates the local offer and publishes it on the relay.
    pub async fn start_as_offerer(&self) -> SessionResult<SessionDescription> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::StartAsOfferer { reply }, rx)
            .await?
    }

    /// Answers `offer` and publishes the answer. Offers delivered by the relay are answered
    /// without this call.
    pub async fn start_as_answerer(
        &self,
        offer: SessionDescription,
    ) -> SessionResult<SessionDescription> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::StartAsAnswerer { offer, reply }, rx)
            .await?
    }

    /// Stream of connection states starting with the current one. Ends after `Closed`.
    pub fn observe_state(&self) -> BoxStream<'static, ConnectionState> {
        self.observer.observe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.observer.current()
    }

    /// Fires `callback` for every remote track, including those received before registering.
    pub async fn on_remote_track<F>(&self, callback: F) -> SessionResult<()>
    where
        F: Fn(RemoteTrack) + Send + Sync + 'static,
    {
        self.command_tx
            .send(SessionCommand::OnRemoteTrack {
                callback: Box::new(callback),
            })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Closes the session. Returns once teardown is complete; closing twice is a no-op.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Close { reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    async fn request<T>(
        &self,
        command: SessionCommand,
        rx: oneshot::Receiver<T>,
    ) -> SessionResult<T> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }
}
