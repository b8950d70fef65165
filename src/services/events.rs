//! Realtime event hub
//!
//! Room-based fanout for WebSocket sessions. Rooms are created lazily on
//! first join and dropped when the last member leaves; each connection owns
//! an unbounded channel the hub pushes serialized events into. Events are
//! fire-and-forget: a closed receiver is pruned on the next publish.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// A single event delivered into a room.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeEvent {
    pub event: String,
    pub room: String,
    pub data: serde_json::Value,
}

impl RealtimeEvent {
    pub fn new(event: impl Into<String>, room: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            room: room.into(),
            data,
        }
    }
}

/// One connection's seat in a room. The user id travels with the sender
/// so suppression (typing echo) can target every connection of a user,
/// not just the one that sent the frame.
struct Member {
    user_id: Uuid,
    tx: UnboundedSender<RealtimeEvent>,
}

type RoomMembers = HashMap<Uuid, Member>;

/// Shared room registry. Cheap to clone; all clones share the same rooms.
#[derive(Clone, Default)]
pub struct EventHub {
    rooms: Arc<RwLock<HashMap<String, RoomMembers>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room.
    pub fn join(&self, room: &str, conn_id: Uuid, user_id: Uuid, tx: UnboundedSender<RealtimeEvent>) {
        let mut rooms = self.rooms.write();
        rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn_id, Member { user_id, tx });
    }

    /// Remove a connection from a room, dropping the room when empty.
    pub fn leave(&self, room: &str, conn_id: Uuid) {
        let mut rooms = self.rooms.write();
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Remove a connection from every room it joined.
    pub fn leave_all(&self, conn_id: Uuid) {
        let mut rooms = self.rooms.write();
        rooms.retain(|_, members| {
            members.remove(&conn_id);
            !members.is_empty()
        });
    }

    /// Deliver an event to every member of a room. Returns the number of
    /// live receivers reached.
    pub fn publish(&self, room: &str, event: RealtimeEvent) -> usize {
        self.publish_filtered(room, None, event)
    }

    /// Deliver an event to every room member except connections belonging
    /// to `skip_user` (used for typing indicators, which must not echo
    /// back to any of the typist's own devices).
    pub fn publish_except(&self, room: &str, skip_user: Uuid, event: RealtimeEvent) -> usize {
        self.publish_filtered(room, Some(skip_user), event)
    }

    /// Deliver an event to a user's personal room.
    pub fn notify_user(&self, user_id: Uuid, event: RealtimeEvent) -> usize {
        self.publish(&crate::domain::messages::user_room_key(user_id), event)
    }

    fn publish_filtered(&self, room: &str, skip_user: Option<Uuid>, event: RealtimeEvent) -> usize {
        let mut delivered = 0;
        let mut dead: Vec<Uuid> = Vec::new();

        {
            let rooms = self.rooms.read();
            let Some(members) = rooms.get(room) else {
                return 0;
            };
            for (conn_id, member) in members {
                if skip_user == Some(member.user_id) {
                    continue;
                }
                if member.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(*conn_id);
                }
            }
        }

        if !dead.is_empty() {
            let mut rooms = self.rooms.write();
            if let Some(members) = rooms.get_mut(room) {
                for conn_id in dead {
                    members.remove(&conn_id);
                }
                if members.is_empty() {
                    rooms.remove(room);
                }
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn event(name: &str, room: &str) -> RealtimeEvent {
        RealtimeEvent::new(name, room, serde_json::json!({}))
    }

    #[test]
    fn publish_reaches_all_members() {
        let hub = EventHub::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        hub.join("job:1", Uuid::new_v4(), user_a, tx_a);
        hub.join("job:1", Uuid::new_v4(), user_b, tx_b);

        assert_eq!(hub.publish("job:1", event("message", "job:1")), 2);
        assert_eq!(rx_a.try_recv().unwrap().event, "message");
        assert_eq!(rx_b.try_recv().unwrap().event, "message");
    }

    #[test]
    fn publish_except_skips_sender() {
        let hub = EventHub::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        hub.join("job:1", Uuid::new_v4(), user_a, tx_a);
        hub.join("job:1", Uuid::new_v4(), user_b, tx_b);

        assert_eq!(
            hub.publish_except("job:1", user_a, event("typing", "job:1")),
            1
        );
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap().event, "typing");
    }

    #[test]
    fn publish_except_skips_every_connection_of_the_user() {
        // A user typing on their phone must not see the indicator on
        // their laptop either.
        let hub = EventHub::new();
        let (tx_phone, mut rx_phone) = unbounded_channel();
        let (tx_laptop, mut rx_laptop) = unbounded_channel();
        let (tx_other, mut rx_other) = unbounded_channel();
        let typist = Uuid::new_v4();
        let other = Uuid::new_v4();

        hub.join("job:1", Uuid::new_v4(), typist, tx_phone);
        hub.join("job:1", Uuid::new_v4(), typist, tx_laptop);
        hub.join("job:1", Uuid::new_v4(), other, tx_other);

        assert_eq!(
            hub.publish_except("job:1", typist, event("typing", "job:1")),
            1
        );
        assert!(rx_phone.try_recv().is_err());
        assert!(rx_laptop.try_recv().is_err());
        assert_eq!(rx_other.try_recv().unwrap().event, "typing");
    }

    #[test]
    fn publish_to_empty_room_is_zero() {
        let hub = EventHub::new();
        assert_eq!(hub.publish("job:nope", event("message", "job:nope")), 0);
    }

    #[test]
    fn closed_receivers_are_pruned() {
        let hub = EventHub::new();
        let (tx, rx) = unbounded_channel();
        hub.join("job:1", Uuid::new_v4(), Uuid::new_v4(), tx);
        drop(rx);

        assert_eq!(hub.publish("job:1", event("message", "job:1")), 0);
        // Room was dropped along with its last dead member
        assert_eq!(hub.publish("job:1", event("message", "job:1")), 0);
    }

    #[test]
    fn leave_all_clears_membership() {
        let hub = EventHub::new();
        let (tx, mut rx) = unbounded_channel();
        let conn = Uuid::new_v4();
        let user = Uuid::new_v4();
        hub.join("job:1", conn, user, tx.clone());
        hub.join("job:2", conn, user, tx);

        hub.leave_all(conn);
        assert_eq!(hub.publish("job:1", event("message", "job:1")), 0);
        assert_eq!(hub.publish("job:2", event("message", "job:2")), 0);
        assert!(rx.try_recv().is_err());
    }
}
