//! # Plaza
//!
//! Presence and state sync server for shared virtual rooms.
//!
//! Plaza keeps every connected player's room, position, and identity in an
//! authoritative in-memory registry, and relays movement and chat between
//! the occupants of a room. It is the real-time half of a virtual-space
//! application; durable identity and room data live behind the
//! [`IdentityStore`](plaza_directory::IdentityStore) and
//! [`RoomCatalog`](plaza_directory::RoomCatalog) traits.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use plaza::prelude::*;
//!
//! # async fn run(identity: plaza_directory::MemoryIdentityStore,
//! #              catalog: plaza_directory::MemoryRoomCatalog)
//! #     -> Result<(), PlazaError> {
//! let server = PlazaServer::<MemoryIdentityStore, MemoryRoomCatalog, AllowAll>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(identity, catalog)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;
mod validate;

pub use error::PlazaError;
pub use server::{PlazaServer, PlazaServerBuilder};
pub use validate::{AllowAll, MoveValidator, StepLimit};

/// Commonly used types, re-exported for one-line imports.
pub mod prelude {
    pub use crate::{AllowAll, MoveValidator, PlazaError, PlazaServer, PlazaServerBuilder};
    pub use plaza_directory::{
        IdentityStore, MemoryIdentityStore, MemoryRoomCatalog, Profile, RoomCatalog, RoomRecord,
    };
    pub use plaza_protocol::{
        AccountId, ClientEvent, ConnectionId, PlayerRecord, Position, RoomId, ServerEvent,
    };
}
