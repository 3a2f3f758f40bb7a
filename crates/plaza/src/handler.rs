//! Per-connection handler: event loop, join flow, and relays.
//!
//! Each accepted connection gets two Tokio tasks:
//!   - the handler task (this module), which receives and dispatches
//!     client events
//!   - a writer task, which drains the connection's outbound channel and
//!     writes encoded events to the socket
//!
//! Splitting the directions means a broadcast to a connection never waits
//! on that connection's pending `recv`, and the registry lock is never
//! held across network I/O.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use plaza_directory::{access, AccessError, DirectoryError, IdentityStore, RoomCatalog};
use plaza_protocol::{
    AccountId, ClientEvent, Codec, ConnectionId, PlayerRecord, Position, RoomId, ServerEvent,
};
use plaza_registry::{spawn_position, EventSender};
use plaza_transport::{Connection, WebSocketConnection};

use crate::server::ServerState;
use crate::validate::MoveValidator;
use crate::PlazaError;

/// Drop guard that removes the connection's session when the handler
/// exits, broadcasting `PlayerLeft` to the room it occupied.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct DepartureGuard<I: IdentityStore, R: RoomCatalog, V: MoveValidator> {
    connection_id: ConnectionId,
    state: Arc<ServerState<I, R, V>>,
}

impl<I: IdentityStore, R: RoomCatalog, V: MoveValidator> Drop for DepartureGuard<I, R, V> {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            depart(&state, connection_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<I, R, V>(
    conn: WebSocketConnection,
    state: Arc<ServerState<I, R, V>>,
) -> Result<(), PlazaError>
where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let conn = Arc::new(conn);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: drains the outbound channel until every sender (the
    // handler's own handle plus the registry's clone) is gone, then
    // closes the socket.
    let writer = {
        let conn = Arc::clone(&conn);
        let codec = state.codec;
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let bytes = match codec.encode(&event) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "failed to encode event");
                        continue;
                    }
                };
                if conn.send(&bytes).await.is_err() {
                    break;
                }
            }
            let _ = conn.close().await;
        })
    };

    // Idempotent: fires on every exit path, does nothing if the
    // connection never joined (or already left).
    let _guard = DepartureGuard {
        connection_id: conn_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode client event");
                continue;
            }
        };

        match event {
            ClientEvent::Join {
                account_id,
                room_id,
                passcode,
            } => {
                handle_join(&state, conn_id, &tx, account_id, room_id, passcode).await;
            }
            ClientEvent::Move { position } => {
                handle_move(&state, conn_id, position).await;
            }
            ClientEvent::ChatMessage { text } => {
                handle_chat(&state, conn_id, text).await;
            }
            ClientEvent::Leave { .. } => {
                // The connection stays open; the client may join again.
                depart(&state, conn_id).await;
            }
        }
    }

    // _guard drops here → departure fires; dropping `tx` lets the writer
    // task finish once the registry entry is gone.
    drop(_guard);
    drop(tx);
    let _ = writer.await;

    Ok(())
}

/// The join flow: resolve identity, authorize, evict ghosts, materialize,
/// announce.
async fn handle_join<I, R, V>(
    state: &Arc<ServerState<I, R, V>>,
    conn_id: ConnectionId,
    sender: &EventSender,
    account_id: AccountId,
    room_id: RoomId,
    passcode: Option<String>,
) where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    // Step 1: the room must exist.
    let Some(room) = state.catalog.lookup(room_id).await else {
        tracing::debug!(%conn_id, %room_id, "join refused: room not found");
        let _ = sender.send(ServerEvent::JoinError {
            reason: AccessError::RoomNotFound(room_id).to_string(),
        });
        return;
    };

    // Step 2: the passcode gate. A refusal leaves the registry untouched.
    if let Err(e) = access::authorize(&room, account_id, passcode.as_deref()) {
        tracing::debug!(%conn_id, %account_id, %room_id, "join refused: {e}");
        let _ = sender.send(ServerEvent::JoinError {
            reason: e.to_string(),
        });
        return;
    }

    // Step 3: the account must exist.
    let profile = match state.identity.fetch(account_id).await {
        Ok(profile) => profile,
        Err(e @ DirectoryError::UnknownAccount(_)) => {
            tracing::debug!(%conn_id, %account_id, "join refused: unknown account");
            let _ = sender.send(ServerEvent::JoinError {
                reason: e.to_string(),
            });
            return;
        }
        Err(e) => {
            tracing::warn!(%conn_id, %account_id, error = %e, "identity lookup failed");
            let _ = sender.send(ServerEvent::JoinError {
                reason: "identity lookup failed".to_string(),
            });
            return;
        }
    };

    let mut registry = state.registry.lock().await;

    // A connection joining again switches rooms; its old room sees it leave.
    if let Some(old) = registry.remove(conn_id) {
        registry.broadcast(
            old.room_id,
            None,
            &ServerEvent::PlayerLeft {
                connection_id: conn_id,
            },
        );
    }

    // Step 4: at most one live session per account. Older sessions for
    // this account are ghosts; their rooms see them leave.
    for ghost in registry.evict_account(account_id, conn_id) {
        tracing::info!(
            %account_id,
            ghost = %ghost.connection_id,
            room_id = %ghost.room_id,
            "evicted ghost session"
        );
        registry.broadcast(
            ghost.room_id,
            None,
            &ServerEvent::PlayerLeft {
                connection_id: ghost.connection_id,
            },
        );
    }

    // Step 5: materialize the player at their spawn position.
    let record = PlayerRecord {
        connection_id: conn_id,
        account_id,
        room_id,
        username: profile.username,
        avatar: profile.avatar,
        position: spawn_position(profile.last_position),
    };
    registry.insert(record.clone(), sender.clone());

    // Step 6: the joiner gets its authoritative record and a snapshot of
    // the room; everyone else learns about the joiner.
    registry.send_to(
        conn_id,
        ServerEvent::JoinSuccess {
            player: record.clone(),
        },
    );
    let others = registry.occupants_except(room_id, conn_id);
    registry.send_to(conn_id, ServerEvent::CurrentPlayers { players: others });
    registry.broadcast(
        room_id,
        Some(conn_id),
        &ServerEvent::PlayerJoined { player: record },
    );

    tracing::info!(%conn_id, %account_id, %room_id, "player joined room");
}

/// Relays a position update to the room and persists it off the hot path.
async fn handle_move<I, R, V>(
    state: &Arc<ServerState<I, R, V>>,
    conn_id: ConnectionId,
    position: Position,
) where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    // Update and broadcast under one lock acquisition so observers never
    // see moves out of order with the positions they carry.
    let account_id = {
        let mut registry = state.registry.lock().await;

        let Some(record) = registry.get(conn_id) else {
            tracing::debug!(%conn_id, "move from connection not in a room");
            return;
        };
        if !state.validator.allow(record, position) {
            tracing::debug!(%conn_id, %position, "move rejected by validator");
            return;
        }

        let Some((account_id, room_id)) = registry.set_position(conn_id, position) else {
            return;
        };
        registry.broadcast(
            room_id,
            Some(conn_id),
            &ServerEvent::PlayerMoved {
                connection_id: conn_id,
                position,
            },
        );
        account_id
    };

    // Fire and forget: a slow identity backend delays persistence, never
    // the broadcast above.
    let state = Arc::clone(state);
    tokio::spawn(async move {
        if let Err(e) = state.identity.store_position(account_id, position).await {
            tracing::warn!(%account_id, error = %e, "failed to persist position");
        }
    });
}

/// Relays a chat line to the whole room, sender included.
async fn handle_chat<I, R, V>(
    state: &Arc<ServerState<I, R, V>>,
    conn_id: ConnectionId,
    text: String,
) where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    let registry = state.registry.lock().await;

    let Some(record) = registry.get(conn_id) else {
        tracing::debug!(%conn_id, "chat from connection not in a room");
        return;
    };

    let event = ServerEvent::Chat {
        connection_id: conn_id,
        username: record.username.clone(),
        text,
        timestamp: now_ms(),
    };
    registry.broadcast(record.room_id, None, &event);
}

/// Removes the connection's session and tells its room. Idempotent, so
/// explicit leave, socket close, and the drop guard can all race safely.
async fn depart<I, R, V>(state: &Arc<ServerState<I, R, V>>, conn_id: ConnectionId)
where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    let mut registry = state.registry.lock().await;
    if let Some(record) = registry.remove(conn_id) {
        tracing::info!(
            %conn_id,
            account_id = %record.account_id,
            room_id = %record.room_id,
            "player left room"
        );
        registry.broadcast(
            record.room_id,
            None,
            &ServerEvent::PlayerLeft {
                connection_id: conn_id,
            },
        );
    }
}

/// Server-assigned chat timestamp in unix milliseconds.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
