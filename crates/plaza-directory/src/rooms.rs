use std::collections::HashMap;
use std::future::Future;

use plaza_protocol::{AccountId, RoomId};
use tokio::sync::RwLock;

/// Catalog metadata for one room, as authorization needs to see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub room_id: RoomId,
    pub name: String,
    /// Advisory capacity. Carried for clients that render room lists;
    /// the server does not enforce it at join time.
    pub max_players: u32,
    pub is_private: bool,
    /// Required for private rooms. `None` on a private room means nobody
    /// but the creator gets in.
    pub passcode: Option<String>,
    /// The account that created the room. Always admitted, passcode or not.
    pub creator: AccountId,
}

/// Looks up rooms for the authorization gate.
pub trait RoomCatalog: Send + Sync + 'static {
    /// Returns the room's record, or `None` if no such room exists.
    fn lookup(&self, room_id: RoomId) -> impl Future<Output = Option<RoomRecord>> + Send;
}

/// `HashMap`-backed room catalog for demos and tests.
#[derive(Debug, Default)]
pub struct MemoryRoomCatalog {
    rooms: RwLock<HashMap<RoomId, RoomRecord>>,
}

impl MemoryRoomCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_room(&self, record: RoomRecord) {
        self.rooms.write().await.insert(record.room_id, record);
    }
}

impl RoomCatalog for MemoryRoomCatalog {
    async fn lookup(&self, room_id: RoomId) -> Option<RoomRecord> {
        self.rooms.read().await.get(&room_id).cloned()
    }
}
