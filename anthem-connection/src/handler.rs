//! Dispatch seam between the read loop and whatever owns the state

use anthem_protocol::ResponseEvent;

use crate::state::ConnectionState;

/// Receives everything the connection manager observes
///
/// Called from the session task. Implementations must return quickly; a
/// slow handler delays reading from the socket.
pub trait ResponseHandler: Send + Sync + 'static {
    /// One classified inbound line
    fn handle_response(&self, event: ResponseEvent);

    /// Connection state transition
    fn connection_state_changed(&self, _state: ConnectionState) {}
}
