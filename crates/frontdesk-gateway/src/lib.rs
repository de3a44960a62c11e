//! Real-time gateway for Frontdesk.
//!
//! Transport-agnostic: a transport registers each live connection, feeds
//! parsed client events in, and drains a bounded queue of server events out.
//! Sessions map to rooms; every staff connection also sits in the shared
//! agent room.

pub mod error;
pub mod gateway;
pub mod protocol;
pub mod rooms;
pub mod sequencer;

pub use error::GatewayError;
pub use gateway::{ConnectMetadata, Gateway, JoinOutcome};
pub use protocol::ClientEvent;
pub use rooms::{ConnectionId, RoomKey, RoomTable};
pub use sequencer::{SessionGuard, SessionLocks};
