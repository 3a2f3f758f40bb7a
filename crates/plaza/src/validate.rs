//! Movement validation hook.
//!
//! Plaza relays client-reported positions as-is by default, matching the
//! trust model of a social space rather than a competitive game. The
//! [`MoveValidator`] trait is the seam for deployments that want more:
//! implement it to clamp positions to room bounds, rate-limit teleports,
//! or run collision checks.

use plaza_protocol::{PlayerRecord, Position};

/// Decides whether a reported move is accepted.
///
/// Called with the player's current record (including their last accepted
/// position) and the position they are asking to move to. A rejected move
/// is dropped silently: no broadcast, no persistence, no error reply.
pub trait MoveValidator: Send + Sync + 'static {
    fn allow(&self, player: &PlayerRecord, next: Position) -> bool;
}

/// The default validator: every move is accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl MoveValidator for AllowAll {
    fn allow(&self, _player: &PlayerRecord, _next: Position) -> bool {
        true
    }
}

/// Rejects moves that cover more than `max_step` distance in one update.
///
/// Coarse teleport protection. Legitimate clients send movement at input
/// rate, so per-update displacement stays small.
#[derive(Debug, Clone, Copy)]
pub struct StepLimit {
    pub max_step: f64,
}

impl MoveValidator for StepLimit {
    fn allow(&self, player: &PlayerRecord, next: Position) -> bool {
        let dx = next.x - player.position.x;
        let dy = next.y - player.position.y;
        (dx * dx + dy * dy).sqrt() <= self.max_step
    }
}
