//! Wire protocol for Plaza.
//!
//! This crate defines the language clients and the presence server speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`PlayerRecord`], the id
//!   newtypes) — the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong in between.
//!
//! The protocol layer knows nothing about connections, rooms, or the
//! registry; it only describes messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    AccountId, ClientEvent, ConnectionId, PlayerRecord, Position, RoomId,
    ServerEvent,
};
