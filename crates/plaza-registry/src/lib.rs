//! In-memory presence registry.
//!
//! [`SessionRegistry`] is the single source of truth for who is connected,
//! which room they occupy, and where they stand. It owns the outbound event
//! channel for every connection, so room broadcasts and targeted sends both
//! go through it. The registry itself is synchronous; callers wrap it in a
//! `Mutex` and keep lock scopes short.

mod registry;
mod spawn;

pub use registry::{EventSender, SessionRegistry};
pub use spawn::spawn_position;
