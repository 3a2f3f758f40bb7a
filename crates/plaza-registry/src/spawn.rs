use plaza_protocol::Position;
use rand::Rng;

const DEFAULT_SPAWN: Position = Position { x: 400.0, y: 300.0 };
const SPAWN_JITTER: f64 = 30.0;

/// Picks the position a player materializes at when they join a room.
///
/// A player with a stored position reappears exactly where they left off.
/// Everyone else lands near the room's default spawn point, offset by a
/// small random jitter so simultaneous joiners don't stack on one pixel.
pub fn spawn_position(last_known: Option<Position>) -> Position {
    match last_known {
        Some(position) => position,
        None => {
            let mut rng = rand::rng();
            Position {
                x: DEFAULT_SPAWN.x + rng.random_range(-SPAWN_JITTER..=SPAWN_JITTER),
                y: DEFAULT_SPAWN.y + rng.random_range(-SPAWN_JITTER..=SPAWN_JITTER),
            }
        }
    }
}
