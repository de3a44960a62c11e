//! Room table: which live connection sits in which room.
//!
//! Owned by the gateway and guarded by a `std::sync::RwLock`. Fan-out takes
//! the read lock, joins and leaves take the write lock, and no guard is ever
//! held across an `.await`: delivery is a non-blocking `try_send` into each
//! member's bounded outbound queue.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;

use frontdesk_core::events::ServerEvent;
use frontdesk_core::types::Role;

/// Identifier of one live connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A broadcast scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoomKey {
    Session(Uuid),
    Agents,
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::Session(id) => write!(f, "session:{}", id),
            RoomKey::Agents => f.write_str("agents"),
        }
    }
}

struct ConnectionEntry {
    tx: mpsc::Sender<ServerEvent>,
    role: Option<Role>,
    rooms: HashSet<RoomKey>,
}

#[derive(Default)]
struct RoomState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

pub struct RoomTable {
    state: RwLock<RoomState>,
    next_id: AtomicU64,
    capacity: usize,
}

impl RoomTable {
    /// `capacity` bounds each connection's outbound queue.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(RoomState::default()),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    /// Register a connection and hand back the receiving end of its queue.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.capacity);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .insert(
                id,
                ConnectionEntry {
                    tx,
                    role: None,
                    rooms: HashSet::new(),
                },
            );
        (id, rx)
    }

    /// Record the role a connection joined with. `false` if unknown.
    pub fn set_role(&self, conn: ConnectionId, role: Role) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match state.connections.get_mut(&conn) {
            Some(entry) => {
                entry.role = Some(role);
                true
            }
            None => false,
        }
    }

    pub fn role(&self, conn: ConnectionId) -> Option<Role> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .get(&conn)
            .and_then(|e| e.role)
    }

    /// Add a connection to a room. `false` if the connection is unknown.
    pub fn join(&self, conn: ConnectionId, room: RoomKey) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = state.connections.get_mut(&conn) else {
            return false;
        };
        entry.rooms.insert(room);
        state.rooms.entry(room).or_default().insert(conn);
        debug!(connection = %conn, room = %room, "Joined room");
        true
    }

    /// Move a connection into `session:<id>`, leaving any other session room
    /// it was in. The agent room is untouched. `false` if the connection is
    /// unknown.
    pub fn join_session(&self, conn: ConnectionId, session_id: Uuid) -> bool {
        let room = RoomKey::Session(session_id);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = state.connections.get_mut(&conn) else {
            return false;
        };
        let previous = take_session_rooms(&mut entry.rooms, Some(room));
        entry.rooms.insert(room);
        for old in previous {
            remove_member(&mut state.rooms, old, conn);
            debug!(connection = %conn, room = %old, "Left room");
        }
        state.rooms.entry(room).or_default().insert(conn);
        debug!(connection = %conn, room = %room, "Joined room");
        true
    }

    /// Remove a connection from every session room it is in.
    pub fn leave_sessions(&self, conn: ConnectionId) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = state.connections.get_mut(&conn) else {
            return;
        };
        for old in take_session_rooms(&mut entry.rooms, None) {
            remove_member(&mut state.rooms, old, conn);
        }
    }

    /// The session room a connection is in, if any.
    pub fn session_of(&self, conn: ConnectionId) -> Option<Uuid> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .get(&conn)?
            .rooms
            .iter()
            .find_map(|room| match room {
                RoomKey::Session(id) => Some(*id),
                RoomKey::Agents => None,
            })
    }

    pub fn leave(&self, conn: ConnectionId, room: RoomKey) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = state.connections.get_mut(&conn) {
            entry.rooms.remove(&room);
        }
        remove_member(&mut state.rooms, room, conn);
    }

    /// Drop a connection and every membership it holds.
    pub fn remove(&self, conn: ConnectionId) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = state.connections.remove(&conn) else {
            return false;
        };
        for room in entry.rooms {
            remove_member(&mut state.rooms, room, conn);
        }
        true
    }

    pub fn contains(&self, conn: ConnectionId, room: RoomKey) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .get(&room)
            .is_some_and(|members| members.contains(&conn))
    }

    pub fn room_size(&self, room: RoomKey) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .rooms
            .get(&room)
            .map_or(0, HashSet::len)
    }

    pub fn connection_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .len()
    }

    /// Queue an event for a single connection.
    pub fn send_to(&self, conn: ConnectionId, event: ServerEvent) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match state.connections.get(&conn) {
            Some(entry) => deliver(conn, &entry.tx, event),
            None => false,
        }
    }

    /// Queue an event for every member of `room`. Returns how many accepted it.
    pub fn broadcast(&self, room: RoomKey, event: &ServerEvent) -> usize {
        self.broadcast_filtered(room, event, |_, _| true)
    }

    /// Queue an event for the members of `room` that `keep` selects.
    pub fn broadcast_filtered<F>(&self, room: RoomKey, event: &ServerEvent, keep: F) -> usize
    where
        F: Fn(ConnectionId, Option<Role>) -> bool,
    {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let Some(members) = state.rooms.get(&room) else {
            return 0;
        };

        let mut delivered = 0;
        for conn in members {
            let Some(entry) = state.connections.get(conn) else {
                continue;
            };
            if keep(*conn, entry.role) && deliver(*conn, &entry.tx, event.clone()) {
                delivered += 1;
            }
        }
        delivered
    }
}

/// Strip session rooms other than `keep` from a connection's membership set.
fn take_session_rooms(rooms: &mut HashSet<RoomKey>, keep: Option<RoomKey>) -> Vec<RoomKey> {
    let stale: Vec<RoomKey> = rooms
        .iter()
        .copied()
        .filter(|room| matches!(room, RoomKey::Session(_)) && Some(*room) != keep)
        .collect();
    for room in &stale {
        rooms.remove(room);
    }
    stale
}

fn remove_member(rooms: &mut HashMap<RoomKey, HashSet<ConnectionId>>, room: RoomKey, conn: ConnectionId) {
    if let Some(members) = rooms.get_mut(&room) {
        members.remove(&conn);
        if members.is_empty() {
            rooms.remove(&room);
        }
    }
}

fn deliver(conn: ConnectionId, tx: &mpsc::Sender<ServerEvent>, event: ServerEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(event)) => {
            warn!(connection = %conn, event = event.name(), "Outbound queue full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(connection = %conn, "Outbound queue closed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontdesk_core::types::SenderKind;

    fn typing(sid: Uuid) -> ServerEvent {
        ServerEvent::typing(sid, true, SenderKind::Visitor)
    }

    #[test]
    fn test_room_key_display() {
        let sid = Uuid::nil();
        assert_eq!(
            RoomKey::Session(sid).to_string(),
            "session:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(RoomKey::Agents.to_string(), "agents");
    }

    #[test]
    fn test_broadcast_reaches_only_room_members() {
        let table = RoomTable::new(8);
        let sid = Uuid::new_v4();
        let (a, mut rx_a) = table.register();
        let (b, mut rx_b) = table.register();
        let (_c, mut rx_c) = table.register();
        assert!(table.join(a, RoomKey::Session(sid)));
        assert!(table.join(b, RoomKey::Session(sid)));

        assert_eq!(table.broadcast(RoomKey::Session(sid), &typing(sid)), 2);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_to_empty_room() {
        let table = RoomTable::new(8);
        assert_eq!(table.broadcast(RoomKey::Agents, &typing(Uuid::new_v4())), 0);
    }

    #[test]
    fn test_full_queue_drops_for_that_connection_only() {
        let table = RoomTable::new(1);
        let sid = Uuid::new_v4();
        let (slow, mut rx_slow) = table.register();
        let (fast, mut rx_fast) = table.register();
        table.join(slow, RoomKey::Session(sid));
        table.join(fast, RoomKey::Session(sid));

        assert_eq!(table.broadcast(RoomKey::Session(sid), &typing(sid)), 2);
        rx_fast.try_recv().unwrap();
        // `slow` still holds its first event, so the second is dropped for it.
        assert_eq!(table.broadcast(RoomKey::Session(sid), &typing(sid)), 1);
        assert!(rx_fast.try_recv().is_ok());
        assert!(rx_slow.try_recv().is_ok());
        assert!(rx_slow.try_recv().is_err());
    }

    #[test]
    fn test_remove_clears_all_memberships() {
        let table = RoomTable::new(8);
        let sid = Uuid::new_v4();
        let (conn, _rx) = table.register();
        table.join(conn, RoomKey::Agents);
        table.join(conn, RoomKey::Session(sid));
        assert_eq!(table.connection_count(), 1);

        assert!(table.remove(conn));
        assert!(!table.contains(conn, RoomKey::Agents));
        assert_eq!(table.room_size(RoomKey::Session(sid)), 0);
        assert_eq!(table.connection_count(), 0);
        assert!(!table.remove(conn));
    }

    #[test]
    fn test_leave_single_room() {
        let table = RoomTable::new(8);
        let sid = Uuid::new_v4();
        let (conn, _rx) = table.register();
        table.join(conn, RoomKey::Agents);
        table.join(conn, RoomKey::Session(sid));
        table.leave(conn, RoomKey::Session(sid));
        assert!(table.contains(conn, RoomKey::Agents));
        assert!(!table.contains(conn, RoomKey::Session(sid)));
    }

    #[test]
    fn test_join_session_swaps_session_room() {
        let table = RoomTable::new(8);
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        let (conn, mut rx) = table.register();
        table.join(conn, RoomKey::Agents);
        assert!(table.join_session(conn, first));
        assert!(table.join_session(conn, second));

        assert!(!table.contains(conn, RoomKey::Session(first)));
        assert!(table.contains(conn, RoomKey::Session(second)));
        assert!(table.contains(conn, RoomKey::Agents));
        assert_eq!(table.session_of(conn), Some(second));
        assert_eq!(table.room_size(RoomKey::Session(first)), 0);

        assert_eq!(table.broadcast(RoomKey::Session(first), &typing(first)), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_join_same_session_twice_is_idempotent() {
        let table = RoomTable::new(8);
        let sid = Uuid::new_v4();
        let (conn, _rx) = table.register();
        table.join_session(conn, sid);
        table.join_session(conn, sid);
        assert_eq!(table.room_size(RoomKey::Session(sid)), 1);
        assert_eq!(table.session_of(conn), Some(sid));
    }

    #[test]
    fn test_leave_sessions_keeps_agent_room() {
        let table = RoomTable::new(8);
        let sid = Uuid::new_v4();
        let (conn, _rx) = table.register();
        table.join(conn, RoomKey::Agents);
        table.join_session(conn, sid);
        table.leave_sessions(conn);
        assert!(table.session_of(conn).is_none());
        assert!(table.contains(conn, RoomKey::Agents));
        assert_eq!(table.room_size(RoomKey::Session(sid)), 0);
    }

    #[test]
    fn test_unknown_connection_cannot_join() {
        let table = RoomTable::new(8);
        let (conn, _rx) = table.register();
        table.remove(conn);
        assert!(!table.join(conn, RoomKey::Agents));
        assert!(!table.join_session(conn, Uuid::new_v4()));
        assert!(!table.set_role(conn, Role::Agent));
        assert!(!table.send_to(conn, typing(Uuid::new_v4())));
    }

    #[test]
    fn test_filtered_broadcast_by_role() {
        let table = RoomTable::new(8);
        let sid = Uuid::new_v4();
        let (visitor, mut rx_visitor) = table.register();
        let (agent, mut rx_agent) = table.register();
        table.set_role(visitor, Role::Visitor);
        table.set_role(agent, Role::Agent);
        table.join(visitor, RoomKey::Session(sid));
        table.join(agent, RoomKey::Session(sid));
        assert_eq!(table.role(agent), Some(Role::Agent));

        let sent = table.broadcast_filtered(RoomKey::Session(sid), &typing(sid), |conn, role| {
            conn != visitor && role != Some(Role::Visitor)
        });
        assert_eq!(sent, 1);
        assert!(rx_agent.try_recv().is_ok());
        assert!(rx_visitor.try_recv().is_err());
    }

    #[test]
    fn test_closed_receiver_is_not_counted() {
        let table = RoomTable::new(8);
        let (conn, rx) = table.register();
        table.join(conn, RoomKey::Agents);
        drop(rx);
        assert_eq!(table.broadcast(RoomKey::Agents, &typing(Uuid::new_v4())), 0);
    }
}
