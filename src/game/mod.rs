//! Game simulation modules

pub mod collision;
pub mod combat;
pub mod entity;
pub mod map;
pub mod room;
pub mod snapshot;

pub use room::{GameRoom, RoomHandle, RoomState};

use crate::ws::protocol::{ClientMsg, ServerMsg};
use uuid::Uuid;

/// Client message received from a WebSocket session
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub session_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}

/// Outbound message envelope. `target` of `None` means broadcast; session
/// writers filter on their own id otherwise.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub target: Option<Uuid>,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn broadcast(msg: ServerMsg) -> Self {
        Self { target: None, msg }
    }

    pub fn to(session_id: Uuid, msg: ServerMsg) -> Self {
        Self {
            target: Some(session_id),
            msg,
        }
    }
}
