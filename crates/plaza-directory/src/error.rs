use plaza_protocol::{AccountId, RoomId};
use thiserror::Error;

/// Why a join request was refused by the room authorization gate.
///
/// The two variants stay distinct on the wire: a client that typo'd a
/// passcode can retry, a client pointed at a deleted room cannot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("invalid passcode for {0}")]
    InvalidPasscode(RoomId),
}

/// Errors from the identity store.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// Backend failure (database down, timeout). Implementations wrap
    /// their own error types in this.
    #[error("storage error: {0}")]
    Storage(String),
}
