//! Identity and room catalog abstractions.
//!
//! Plaza doesn't ship a database. It defines two trait seams instead:
//! [`IdentityStore`] resolves an account id to a displayable [`Profile`]
//! and persists last-known positions, and [`RoomCatalog`] looks up
//! [`RoomRecord`]s for authorization. The in-memory implementations here
//! back the demos and the test suite; production deployments implement the
//! traits over their own storage.
//!
//! [`access::authorize`] is the one piece of policy this crate carries:
//! the passcode gate for private rooms.

pub mod access;
mod error;
mod identity;
mod rooms;

pub use error::{AccessError, DirectoryError};
pub use identity::{IdentityStore, MemoryIdentityStore, Profile};
pub use rooms::{MemoryRoomCatalog, RoomCatalog, RoomRecord};
