//! Conversions between encoder increments and tenth-of-degree azimuth.
//!
//! Azimuth runs from -1800 (inclusive) to 1800 (exclusive). Increment 0 is
//! azimuth -1800. All conversions round half up in integer arithmetic, so
//! they are usable from interrupt handlers.

use num::Integer;

/// Wrapping encoder counter value, `0..INC_PER_TURN`.
pub type Increment = u16;
/// Azimuth in tenths of a degree.
pub type TenthDegree = i16;

/// Encoder counts per mirror revolution.
pub const INC_PER_TURN: Increment = 2000;

pub const TENTH_DEGREE_PER_TURN: i32 = 3600;
pub const MIN_AZIMUTH: TenthDegree = -1800;
pub const MAX_AZIMUTH: TenthDegree = 1799;

fn round_half_up(numer: i32, denom: i32) -> i32 {
    Integer::div_floor(&(2 * numer + denom), &(2 * denom))
}

/// Absolute azimuth to encoder position. Values outside the azimuth range
/// wrap around.
pub fn to_increments(azimuth: TenthDegree) -> Increment {
    let shifted = (azimuth as i32 - MIN_AZIMUTH as i32).rem_euclid(TENTH_DEGREE_PER_TURN);
    let increments = round_half_up(shifted * INC_PER_TURN as i32, TENTH_DEGREE_PER_TURN);

    increments.rem_euclid(INC_PER_TURN as i32) as Increment
}

/// Encoder position to absolute azimuth.
pub fn to_tenth_degree(increments: Increment) -> TenthDegree {
    let increments = (increments % INC_PER_TURN) as i32;
    let shifted = round_half_up(increments * TENTH_DEGREE_PER_TURN, INC_PER_TURN as i32);

    (shifted + MIN_AZIMUTH as i32) as TenthDegree
}

/// Angle difference to increment difference, for scan steps.
pub fn delta_to_increments(delta: TenthDegree) -> i32 {
    round_half_up(delta as i32 * INC_PER_TURN as i32, TENTH_DEGREE_PER_TURN)
}

/// Moves an encoder position by a signed number of increments.
pub fn wrapping_add(position: Increment, delta: i32) -> Increment {
    (position as i32 + delta).rem_euclid(INC_PER_TURN as i32) as Increment
}

/// Shortest signed distance from `from` to `to`.
pub fn signed_distance(from: Increment, to: Increment) -> i32 {
    let turn = INC_PER_TURN as i32;
    let delta = (to as i32 - from as i32).rem_euclid(turn);

    if delta > turn / 2 {
        delta - turn
    } else {
        delta
    }
}
