//! Unified error type for the Plaza server.

use plaza_directory::DirectoryError;
use plaza_protocol::ProtocolError;
use plaza_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlazaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A directory-level error (unknown account, storage failure).
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
