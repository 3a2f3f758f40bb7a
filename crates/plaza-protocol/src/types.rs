//! Core protocol types for Plaza's wire format.
//!
//! Everything in this module travels on the wire between a client and the
//! presence server. The shapes here are the contract: a change to a serde
//! attribute is a protocol change.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a live connection.
///
/// Assigned by the transport when the socket is accepted, unique for the
/// lifetime of the process. One account may be behind several connections
/// over time (multi-tab, reconnects), so presence is keyed by connection,
/// not by account.
///
/// `#[serde(transparent)]` makes `ConnectionId(42)` serialize as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A unique identifier for a durable account in the identity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct-{}", self.0)
    }
}

/// A unique identifier for a room in the room catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A room-local position in floating-point coordinates.
///
/// Positions are client-reported and relayed as-is; the server performs no
/// distance or collision validation (see the `MoveValidator` hook in the
/// `plaza` crate for the opt-in alternative).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// PlayerRecord
// ---------------------------------------------------------------------------

/// The ephemeral presence record for one connection joined to a room.
///
/// One record exists per *connection*, not per account — but the registry
/// enforces that at most one record per account is live at any instant
/// (a newer session evicts the older "ghost").
///
/// This is both the in-memory registry entry and the wire shape sent in
/// [`ServerEvent::JoinSuccess`], [`ServerEvent::CurrentPlayers`], and
/// [`ServerEvent::PlayerJoined`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// The connection this record belongs to.
    pub connection_id: ConnectionId,
    /// The durable account behind the connection.
    pub account_id: AccountId,
    /// The room the player currently occupies.
    pub room_id: RoomId,
    /// Display name, resolved from the identity store at join time.
    pub username: String,
    /// Avatar identifier, resolved from the identity store at join time.
    pub avatar: String,
    /// Current position, mutated in place on every move.
    pub position: Position,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events a client sends to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, e.g.
/// `{ "type": "Move", "position": { "x": 10.0, "y": 20.0 } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Request to join a room. `passcode` is only consulted for private
    /// rooms the account does not own.
    Join {
        account_id: AccountId,
        room_id: RoomId,
        #[serde(default)]
        passcode: Option<String>,
    },

    /// Report a new position for this connection's player.
    Move { position: Position },

    /// Send a chat line to the current room.
    ChatMessage { text: String },

    /// Explicitly leave the current room. The ids are advisory; the
    /// connection itself identifies the departing player.
    Leave {
        account_id: AccountId,
        room_id: RoomId,
    },
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Reply to the joining connection only: its authoritative record,
    /// including the server-chosen spawn position.
    JoinSuccess { player: PlayerRecord },

    /// Reply to the joining connection only: why the join was refused.
    /// The reason distinguishes "room not found" from "invalid passcode"
    /// so the client can decide whether to retry.
    JoinError { reason: String },

    /// Reply to the joining connection only: everyone already in the room,
    /// excluding the joiner itself.
    CurrentPlayers { players: Vec<PlayerRecord> },

    /// Broadcast to the room, excluding the joiner.
    PlayerJoined { player: PlayerRecord },

    /// Broadcast to the room, excluding the mover. The sender never
    /// receives an echo of its own move.
    PlayerMoved {
        connection_id: ConnectionId,
        position: Position,
    },

    /// Broadcast to the whole room, *including* the sender, so every UI
    /// renders the same authoritative line. `timestamp` is server-assigned
    /// unix milliseconds; client clocks are never trusted.
    Chat {
        connection_id: ConnectionId,
        username: String,
        text: String,
        timestamp: u64,
    },

    /// Broadcast to the room's remaining occupants on leave, disconnect,
    /// or ghost eviction.
    PlayerLeft { connection_id: ConnectionId },
}

// =========================================================================
// Tests
// =========================================================================
