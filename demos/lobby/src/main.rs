//! Demo Plaza server: a public lobby and a passcode-gated office, with a
//! handful of seeded accounts. Point a WebSocket client at port 8080 and
//! send `{"type":"Join","account_id":1,"room_id":1}`.

use plaza::prelude::*;
use tracing_subscriber::EnvFilter;

async fn seed() -> (MemoryIdentityStore, MemoryRoomCatalog) {
    let identity = MemoryIdentityStore::new();
    for (id, username, avatar) in [
        (1, "ada", "robot"),
        (2, "bob", "pixel"),
        (3, "eve", "classic"),
    ] {
        identity
            .add_profile(Profile {
                account_id: AccountId(id),
                username: username.into(),
                avatar: avatar.into(),
                last_position: None,
            })
            .await;
    }

    let catalog = MemoryRoomCatalog::new();
    catalog
        .add_room(RoomRecord {
            room_id: RoomId(1),
            name: "lobby".into(),
            max_players: 64,
            is_private: false,
            passcode: None,
            creator: AccountId(1),
        })
        .await;
    catalog
        .add_room(RoomRecord {
            room_id: RoomId(2),
            name: "office".into(),
            max_players: 8,
            is_private: true,
            passcode: Some("hunter2".into()),
            creator: AccountId(1),
        })
        .await;

    (identity, catalog)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (identity, catalog) = seed().await;

    let server = PlazaServer::<MemoryIdentityStore, MemoryRoomCatalog, AllowAll>::builder()
        .bind("0.0.0.0:8080")
        .build(identity, catalog)
        .await?;

    tracing::info!("lobby demo listening on 0.0.0.0:8080");
    server.run().await?;
    Ok(())
}
