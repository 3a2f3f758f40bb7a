//! Integration tests for the Plaza server: join flow, relays, and cleanup.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use plaza::prelude::*;
use plaza::StepLimit;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Fixtures
// =========================================================================

const TOWN_SQUARE: u64 = 1;
const BACK_OFFICE: u64 = 2;

const ADA: u64 = 1; // creator of both rooms
const BOB: u64 = 2;
const EVE: u64 = 3; // has a stored position

async fn seeded_stores() -> (MemoryIdentityStore, MemoryRoomCatalog) {
    let identity = MemoryIdentityStore::new();
    identity
        .add_profile(Profile {
            account_id: AccountId(ADA),
            username: "ada".into(),
            avatar: "robot".into(),
            last_position: None,
        })
        .await;
    identity
        .add_profile(Profile {
            account_id: AccountId(BOB),
            username: "bob".into(),
            avatar: "pixel".into(),
            last_position: None,
        })
        .await;
    identity
        .add_profile(Profile {
            account_id: AccountId(EVE),
            username: "eve".into(),
            avatar: "classic".into(),
            last_position: Some(Position::new(100.0, 200.0)),
        })
        .await;

    let catalog = MemoryRoomCatalog::new();
    catalog
        .add_room(RoomRecord {
            room_id: RoomId(TOWN_SQUARE),
            name: "town square".into(),
            max_players: 64,
            is_private: false,
            passcode: None,
            creator: AccountId(ADA),
        })
        .await;
    catalog
        .add_room(RoomRecord {
            room_id: RoomId(BACK_OFFICE),
            name: "back office".into(),
            max_players: 8,
            is_private: true,
            passcode: Some("hunter2".into()),
            creator: AccountId(ADA),
        })
        .await;

    (identity, catalog)
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a seeded server on a random port and returns the address.
async fn start_server() -> String {
    let (identity, catalog) = seeded_stores().await;
    let server = PlazaServerBuilder::new()
        .bind("127.0.0.1:0")
        .build(identity, catalog)
        .await
        .expect("server should build");
    spawn_server(server).await
}

/// Same, but with a step-limit move validator installed.
async fn start_server_with_step_limit(max_step: f64) -> String {
    let (identity, catalog) = seeded_stores().await;
    let server = PlazaServerBuilder::new()
        .bind("127.0.0.1:0")
        .build_with_validator(identity, catalog, StepLimit { max_step })
        .await
        .expect("server should build");
    spawn_server(server).await
}

async fn spawn_server<I, R, V>(server: plaza::PlazaServer<I, R, V>) -> String
where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_event(ws: &mut ClientWs, event: &ClientEvent) {
    let bytes = serde_json::to_vec(event).expect("encode");
    ws.send(Message::Binary(bytes.into())).await.expect("send");
}

async fn recv_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("recv");
        match msg {
            Message::Binary(data) => return serde_json::from_slice(&data).expect("decode"),
            Message::Text(text) => return serde_json::from_str(&text).expect("decode"),
            _ => continue,
        }
    }
}

/// Joins a room and returns the `JoinSuccess` record plus the
/// `CurrentPlayers` snapshot, asserting that exact reply order.
async fn join(
    ws: &mut ClientWs,
    account: u64,
    room: u64,
    passcode: Option<&str>,
) -> (PlayerRecord, Vec<PlayerRecord>) {
    send_event(
        ws,
        &ClientEvent::Join {
            account_id: AccountId(account),
            room_id: RoomId(room),
            passcode: passcode.map(String::from),
        },
    )
    .await;

    let player = match recv_event(ws).await {
        ServerEvent::JoinSuccess { player } => player,
        other => panic!("expected JoinSuccess, got {other:?}"),
    };
    let players = match recv_event(ws).await {
        ServerEvent::CurrentPlayers { players } => players,
        other => panic!("expected CurrentPlayers, got {other:?}"),
    };
    (player, players)
}

async fn expect_join_error(ws: &mut ClientWs, fragment: &str) {
    match recv_event(ws).await {
        ServerEvent::JoinError { reason } => {
            assert!(
                reason.contains(fragment),
                "reason {reason:?} should contain {fragment:?}"
            );
        }
        other => panic!("expected JoinError, got {other:?}"),
    }
}

// =========================================================================
// Join flow
// =========================================================================

#[tokio::test]
async fn test_join_public_room_succeeds() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player, others) = join(&mut ws, ADA, TOWN_SQUARE, None).await;
    assert_eq!(player.account_id, AccountId(ADA));
    assert_eq!(player.room_id, RoomId(TOWN_SQUARE));
    assert_eq!(player.username, "ada");
    assert_eq!(player.avatar, "robot");
    assert!(others.is_empty());
}

#[tokio::test]
async fn test_join_public_room_ignores_passcode() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player, _) = join(&mut ws, BOB, TOWN_SQUARE, Some("wrong")).await;
    assert_eq!(player.room_id, RoomId(TOWN_SQUARE));
}

#[tokio::test]
async fn test_join_unknown_account_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::Join {
            account_id: AccountId(999),
            room_id: RoomId(TOWN_SQUARE),
            passcode: None,
        },
    )
    .await;
    expect_join_error(&mut ws, "unknown account").await;
}

#[tokio::test]
async fn test_join_missing_room_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::Join {
            account_id: AccountId(ADA),
            room_id: RoomId(404),
            passcode: None,
        },
    )
    .await;
    expect_join_error(&mut ws, "room not found").await;
}

#[tokio::test]
async fn test_join_private_room_wrong_passcode_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::Join {
            account_id: AccountId(BOB),
            room_id: RoomId(BACK_OFFICE),
            passcode: Some("HUNTER2".into()),
        },
    )
    .await;
    expect_join_error(&mut ws, "invalid passcode").await;

    // The rejection left no partial record behind: the same connection
    // retries with the right passcode and finds the room empty.
    let (_, others) = join(&mut ws, BOB, BACK_OFFICE, Some("hunter2")).await;
    assert!(others.is_empty());
}

#[tokio::test]
async fn test_join_private_room_with_passcode_succeeds() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player, _) = join(&mut ws, BOB, BACK_OFFICE, Some("hunter2")).await;
    assert_eq!(player.room_id, RoomId(BACK_OFFICE));
}

#[tokio::test]
async fn test_join_private_room_creator_bypasses_passcode() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player, _) = join(&mut ws, ADA, BACK_OFFICE, None).await;
    assert_eq!(player.room_id, RoomId(BACK_OFFICE));
}

#[tokio::test]
async fn test_second_joiner_sees_existing_players() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    let (ada, _) = join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    let (bob, others) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;

    // The snapshot holds everyone already present, excluding the joiner.
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].connection_id, ada.connection_id);
    assert_eq!(others[0].username, "ada");

    // The earlier occupant is told about the joiner.
    match recv_event(&mut ws1).await {
        ServerEvent::PlayerJoined { player } => {
            assert_eq!(player.connection_id, bob.connection_id);
            assert_eq!(player.username, "bob");
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_joiners_in_different_rooms_are_invisible_to_each_other() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, BACK_OFFICE, None).await;
    let (_, others) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    assert!(others.is_empty());
}

// =========================================================================
// Spawn positions
// =========================================================================

#[tokio::test]
async fn test_fresh_account_spawns_near_default() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player, _) = join(&mut ws, ADA, TOWN_SQUARE, None).await;
    assert!((player.position.x - 400.0).abs() <= 30.0);
    assert!((player.position.y - 300.0).abs() <= 30.0);
}

#[tokio::test]
async fn test_stored_position_spawns_exactly() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    let (player, _) = join(&mut ws, EVE, TOWN_SQUARE, None).await;
    assert_eq!(player.position, Position::new(100.0, 200.0));
}

#[tokio::test]
async fn test_moved_position_survives_reconnect() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, BOB, TOWN_SQUARE, None).await;

    send_event(
        &mut ws,
        &ClientEvent::Move {
            position: Position::new(77.0, 88.0),
        },
    )
    .await;
    // The chat echo proves the move was processed; the persistence task
    // then gets a moment to land.
    send_event(&mut ws, &ClientEvent::ChatMessage { text: "brb".into() }).await;
    match recv_event(&mut ws).await {
        ServerEvent::Chat { .. } => {}
        other => panic!("expected Chat, got {other:?}"),
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    ws.close(None).await.expect("close");

    let mut ws2 = connect(&addr).await;
    let (player, _) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    assert_eq!(player.position, Position::new(77.0, 88.0));
}

// =========================================================================
// Movement relay
// =========================================================================

#[tokio::test]
async fn test_move_broadcast_reaches_peers_but_not_sender() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    let (bob, _) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ws1).await; // PlayerJoined(bob)

    send_event(
        &mut ws2,
        &ClientEvent::Move {
            position: Position::new(10.0, 20.0),
        },
    )
    .await;

    match recv_event(&mut ws1).await {
        ServerEvent::PlayerMoved {
            connection_id,
            position,
        } => {
            assert_eq!(connection_id, bob.connection_id);
            assert_eq!(position, Position::new(10.0, 20.0));
        }
        other => panic!("expected PlayerMoved, got {other:?}"),
    }

    // The sender's next event is the chat echo, not a move echo: events
    // for one connection are delivered in order, so if a PlayerMoved had
    // been sent to ws2 it would arrive before the Chat.
    send_event(&mut ws2, &ClientEvent::ChatMessage { text: "hi".into() }).await;
    match recv_event(&mut ws2).await {
        ServerEvent::Chat { text, .. } => assert_eq!(text, "hi"),
        other => panic!("expected Chat (no move echo), got {other:?}"),
    }
}

#[tokio::test]
async fn test_move_from_unjoined_connection_is_ignored() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::Move {
            position: Position::new(5.0, 5.0),
        },
    )
    .await;

    // The connection is still healthy and can join afterwards.
    let (player, _) = join(&mut ws, ADA, TOWN_SQUARE, None).await;
    assert_eq!(player.username, "ada");
}

#[tokio::test]
async fn test_step_limit_validator_drops_teleports() {
    let addr = start_server_with_step_limit(50.0).await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    let (bob, _) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ws1).await; // PlayerJoined(bob)

    // A jump across the whole room is dropped.
    send_event(
        &mut ws2,
        &ClientEvent::Move {
            position: Position::new(5000.0, 5000.0),
        },
    )
    .await;
    // A small step from the spawn position passes.
    let near = Position::new(bob.position.x + 10.0, bob.position.y);
    send_event(&mut ws2, &ClientEvent::Move { position: near }).await;

    match recv_event(&mut ws1).await {
        ServerEvent::PlayerMoved { position, .. } => {
            assert_eq!(position, near);
        }
        other => panic!("expected PlayerMoved for the small step, got {other:?}"),
    }
}

// =========================================================================
// Chat relay
// =========================================================================

#[tokio::test]
async fn test_chat_reaches_everyone_including_sender() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    let (bob, _) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ws1).await; // PlayerJoined(bob)

    send_event(
        &mut ws2,
        &ClientEvent::ChatMessage {
            text: "hello room".into(),
        },
    )
    .await;

    let seen_by_peer = recv_event(&mut ws1).await;
    let seen_by_sender = recv_event(&mut ws2).await;

    // Both render the same authoritative line, timestamp included.
    assert_eq!(seen_by_peer, seen_by_sender);
    match seen_by_peer {
        ServerEvent::Chat {
            connection_id,
            username,
            text,
            timestamp,
        } => {
            assert_eq!(connection_id, bob.connection_id);
            assert_eq!(username, "bob");
            assert_eq!(text, "hello room");
            assert!(timestamp > 0);
        }
        other => panic!("expected Chat, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_timestamps_never_decrease() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    join(&mut ws, ADA, TOWN_SQUARE, None).await;

    send_event(&mut ws, &ClientEvent::ChatMessage { text: "one".into() }).await;
    send_event(&mut ws, &ClientEvent::ChatMessage { text: "two".into() }).await;

    let first = match recv_event(&mut ws).await {
        ServerEvent::Chat { timestamp, .. } => timestamp,
        other => panic!("expected Chat, got {other:?}"),
    };
    let second = match recv_event(&mut ws).await {
        ServerEvent::Chat { timestamp, .. } => timestamp,
        other => panic!("expected Chat, got {other:?}"),
    };
    assert!(second >= first);
}

#[tokio::test]
async fn test_chat_does_not_cross_rooms() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, BACK_OFFICE, None).await;
    join(&mut ws2, BOB, TOWN_SQUARE, None).await;

    send_event(&mut ws2, &ClientEvent::ChatMessage { text: "psst".into() }).await;

    // ws2 gets its own echo; ws1, in another room, must not.
    match recv_event(&mut ws2).await {
        ServerEvent::Chat { text, .. } => assert_eq!(text, "psst"),
        other => panic!("expected Chat, got {other:?}"),
    }
    let leaked = tokio::time::timeout(Duration::from_millis(200), ws1.next()).await;
    assert!(leaked.is_err(), "chat leaked across rooms: {leaked:?}");
}

// =========================================================================
// Departure and ghost eviction
// =========================================================================

#[tokio::test]
async fn test_disconnect_broadcasts_player_left() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    let (bob, _) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ws1).await; // PlayerJoined(bob)

    ws2.close(None).await.expect("close");

    match recv_event(&mut ws1).await {
        ServerEvent::PlayerLeft { connection_id } => {
            assert_eq!(connection_id, bob.connection_id);
        }
        other => panic!("expected PlayerLeft, got {other:?}"),
    }
}

#[tokio::test]
async fn test_leave_broadcasts_and_allows_rejoin() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut ws2 = connect(&addr).await;

    join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    let (bob, _) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ws1).await; // PlayerJoined(bob)

    send_event(
        &mut ws2,
        &ClientEvent::Leave {
            account_id: AccountId(BOB),
            room_id: RoomId(TOWN_SQUARE),
        },
    )
    .await;

    match recv_event(&mut ws1).await {
        ServerEvent::PlayerLeft { connection_id } => {
            assert_eq!(connection_id, bob.connection_id);
        }
        other => panic!("expected PlayerLeft, got {other:?}"),
    }

    // The connection survives an explicit leave and can join again.
    let (rejoined, others) = join(&mut ws2, BOB, TOWN_SQUARE, None).await;
    assert_eq!(rejoined.connection_id, bob.connection_id);
    assert_eq!(others.len(), 1);
}

#[tokio::test]
async fn test_new_session_evicts_ghost_of_same_account() {
    let addr = start_server().await;
    let mut ghost_ws = connect(&addr).await;
    let mut observer = connect(&addr).await;

    let (ghost, _) = join(&mut ghost_ws, ADA, TOWN_SQUARE, None).await;
    let (bob, _) = join(&mut observer, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ghost_ws).await; // PlayerJoined(bob)

    // The same account joins again on a fresh connection, without the old
    // one ever disconnecting.
    let mut ws = connect(&addr).await;
    let (fresh, others) = join(&mut ws, ADA, TOWN_SQUARE, None).await;
    assert_ne!(fresh.connection_id, ghost.connection_id);

    // The ghost was evicted before the snapshot was taken.
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].connection_id, bob.connection_id);

    // Peers see the ghost leave, then the new session arrive.
    match recv_event(&mut observer).await {
        ServerEvent::PlayerLeft { connection_id } => {
            assert_eq!(connection_id, ghost.connection_id);
        }
        other => panic!("expected PlayerLeft for the ghost, got {other:?}"),
    }
    match recv_event(&mut observer).await {
        ServerEvent::PlayerJoined { player } => {
            assert_eq!(player.connection_id, fresh.connection_id);
        }
        other => panic!("expected PlayerJoined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ghost_eviction_reaches_the_ghosts_old_room() {
    let addr = start_server().await;
    let mut ghost_ws = connect(&addr).await;
    let mut observer = connect(&addr).await;

    // Ada's first session sits in the town square next to Bob.
    let (ghost, _) = join(&mut ghost_ws, ADA, TOWN_SQUARE, None).await;
    join(&mut observer, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ghost_ws).await; // PlayerJoined(bob)

    // Her second session joins a different room entirely.
    let mut ws = connect(&addr).await;
    let (fresh, others) = join(&mut ws, ADA, BACK_OFFICE, None).await;
    assert_eq!(fresh.room_id, RoomId(BACK_OFFICE));
    assert!(others.is_empty());

    // The old room is notified even though the new session never entered it.
    match recv_event(&mut observer).await {
        ServerEvent::PlayerLeft { connection_id } => {
            assert_eq!(connection_id, ghost.connection_id);
        }
        other => panic!("expected PlayerLeft for the ghost, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejoining_connection_switches_rooms() {
    let addr = start_server().await;
    let mut ws1 = connect(&addr).await;
    let mut observer = connect(&addr).await;

    let (ada, _) = join(&mut ws1, ADA, TOWN_SQUARE, None).await;
    join(&mut observer, BOB, TOWN_SQUARE, None).await;
    let _ = recv_event(&mut ws1).await; // PlayerJoined(bob)

    // Ada moves to the private room on the same connection.
    let (moved, _) = join(&mut ws1, ADA, BACK_OFFICE, None).await;
    assert_eq!(moved.room_id, RoomId(BACK_OFFICE));

    // The old room sees her leave.
    match recv_event(&mut observer).await {
        ServerEvent::PlayerLeft { connection_id } => {
            assert_eq!(connection_id, ada.connection_id);
        }
        other => panic!("expected PlayerLeft, got {other:?}"),
    }
}

// =========================================================================
// Robustness
// =========================================================================

#[tokio::test]
async fn test_invalid_payload_is_skipped() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Binary(b"not json".to_vec().into()))
        .await
        .expect("send");

    // The connection still works afterwards.
    let (player, _) = join(&mut ws, ADA, TOWN_SQUARE, None).await;
    assert_eq!(player.username, "ada");
}

#[tokio::test]
async fn test_join_error_keeps_connection_usable() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send_event(
        &mut ws,
        &ClientEvent::Join {
            account_id: AccountId(999),
            room_id: RoomId(TOWN_SQUARE),
            passcode: None,
        },
    )
    .await;
    expect_join_error(&mut ws, "unknown account").await;

    let (player, _) = join(&mut ws, BOB, TOWN_SQUARE, None).await;
    assert_eq!(player.username, "bob");
}
