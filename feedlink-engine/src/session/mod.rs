mod feed_session;
mod session_command;
mod session_event;
mod session_handle;

pub use feed_session::FeedSession;
pub use session_command::SessionCommand;
pub use session_event::SessionEvent;
pub use session_handle::FeedSessionHandle;
