//! The passcode gate for private rooms.

use plaza_protocol::AccountId;

use crate::{AccessError, RoomRecord};

/// Decides whether `account_id` may enter `room`.
///
/// Public rooms admit everyone; any passcode the client happened to send
/// is ignored. Private rooms admit the creator unconditionally, and anyone
/// else only on an exact passcode match. A private room with no passcode
/// configured admits the creator alone.
pub fn authorize(
    room: &RoomRecord,
    account_id: AccountId,
    passcode: Option<&str>,
) -> Result<(), AccessError> {
    if !room.is_private {
        return Ok(());
    }
    if account_id == room.creator {
        return Ok(());
    }
    match (&room.passcode, passcode) {
        (Some(expected), Some(supplied)) if expected == supplied => Ok(()),
        _ => Err(AccessError::InvalidPasscode(room.room_id)),
    }
}
