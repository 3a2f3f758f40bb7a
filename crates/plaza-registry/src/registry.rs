use std::collections::HashMap;

use plaza_protocol::{AccountId, ConnectionId, PlayerRecord, Position, RoomId, ServerEvent};
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound channel handle for a single connection.
///
/// The connection's writer task drains the other end; dropping the receiver
/// (connection gone) makes sends fail silently, which the registry treats
/// as "already departing".
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

struct Occupant {
    record: PlayerRecord,
    sender: EventSender,
}

/// Tracks every live player session and routes events to them.
///
/// One entry per connection. The invariant the join flow relies on: after
/// [`evict_account`](SessionRegistry::evict_account) plus
/// [`insert`](SessionRegistry::insert), at most one entry exists for a given
/// account id.
pub struct SessionRegistry {
    players: HashMap<ConnectionId, Occupant>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// Registers a player session under its connection id.
    pub fn insert(&mut self, record: PlayerRecord, sender: EventSender) {
        debug!(
            connection_id = %record.connection_id,
            account_id = %record.account_id,
            room_id = %record.room_id,
            "registering player session"
        );
        self.players.insert(record.connection_id, Occupant { record, sender });
    }

    /// Removes a session, returning its record if it was still present.
    ///
    /// Idempotent: a second removal for the same connection returns `None`,
    /// so disconnect and explicit leave can race without double-broadcasting.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<PlayerRecord> {
        self.players
            .remove(&connection_id)
            .map(|occupant| occupant.record)
    }

    /// Removes every session belonging to `account_id` except
    /// `keep_connection`, returning the evicted records.
    ///
    /// Called during join to clear ghost sessions left by a reconnect that
    /// outran the old connection's disconnect handling.
    pub fn evict_account(
        &mut self,
        account_id: AccountId,
        keep_connection: ConnectionId,
    ) -> Vec<PlayerRecord> {
        let stale: Vec<ConnectionId> = self
            .players
            .iter()
            .filter(|(id, occupant)| {
                occupant.record.account_id == account_id && **id != keep_connection
            })
            .map(|(id, _)| *id)
            .collect();

        stale
            .into_iter()
            .filter_map(|id| {
                debug!(connection_id = %id, account_id = %account_id, "evicting ghost session");
                self.remove(id)
            })
            .collect()
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&PlayerRecord> {
        self.players
            .get(&connection_id)
            .map(|occupant| &occupant.record)
    }

    /// Updates a session's position, returning who moved and where they are
    /// so the caller can broadcast and persist without a second lookup.
    pub fn set_position(
        &mut self,
        connection_id: ConnectionId,
        position: Position,
    ) -> Option<(AccountId, RoomId)> {
        let occupant = self.players.get_mut(&connection_id)?;
        occupant.record.position = position;
        Some((occupant.record.account_id, occupant.record.room_id))
    }

    /// Snapshot of every player in `room_id` except `exclude`.
    pub fn occupants_except(
        &self,
        room_id: RoomId,
        exclude: ConnectionId,
    ) -> Vec<PlayerRecord> {
        self.players
            .values()
            .filter(|occupant| {
                occupant.record.room_id == room_id && occupant.record.connection_id != exclude
            })
            .map(|occupant| occupant.record.clone())
            .collect()
    }

    /// Sends `event` to every player in `room_id`, optionally skipping one
    /// connection. Send failures mean the target's writer task is already
    /// gone; the departing connection cleans itself up, so they are ignored.
    pub fn broadcast(&self, room_id: RoomId, exclude: Option<ConnectionId>, event: &ServerEvent) {
        for occupant in self.players.values() {
            if occupant.record.room_id != room_id {
                continue;
            }
            if Some(occupant.record.connection_id) == exclude {
                continue;
            }
            let _ = occupant.sender.send(event.clone());
        }
    }

    /// Sends `event` to a single connection, if it is still registered.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(occupant) = self.players.get(&connection_id) {
            let _ = occupant.sender.send(event);
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
