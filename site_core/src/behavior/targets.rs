//! Target computation shared by the behavior kinds.

use rand::Rng;
use std::f64::consts::TAU;

use crate::geometry::{Position, Rect};

/// Uniform offset in `[-amount, amount]`.
pub fn jitter<R: Rng + ?Sized>(amount: f64, rng: &mut R) -> f64 {
    if amount > 0.0 && amount.is_finite() {
        rng.gen_range(-amount..=amount)
    } else {
        0.0
    }
}

/// Random point at most `radius` from `center`.
pub fn point_near<R: Rng + ?Sized>(center: Position, radius: f64, rng: &mut R) -> Position {
    if radius <= 0.0 || !radius.is_finite() {
        return center;
    }
    let angle = rng.gen_range(0.0..TAU);
    let distance = radius * rng.gen_range(0.0f64..=1.0).sqrt();
    center.offset(distance * angle.cos(), distance * angle.sin())
}

/// Close in on `reference` once `current` has fallen more than `threshold`
/// behind. The target lands within `threshold + drift` of the reference.
///
/// `None` when there is nothing to do or any input is not finite.
pub fn approach<R: Rng + ?Sized>(
    current: Position,
    reference: Position,
    threshold: f64,
    drift: f64,
    bounds: Rect,
    rng: &mut R,
) -> Option<Position> {
    let finite = current.is_finite()
        && reference.is_finite()
        && threshold.is_finite()
        && drift.is_finite()
        && bounds.is_finite();
    if !finite {
        return None;
    }
    let threshold = threshold.max(0.0);
    if current.distance(reference) <= threshold {
        return None;
    }
    let target = point_near(reference, threshold + drift.max(0.0), rng);
    Some(bounds.clamp(target))
}

/// Pick a random spot in `area`, jittered by `drift`, travelling at most
/// `limit` from `current`. `None` if the area, drift or limit is not finite.
pub fn roam<R: Rng + ?Sized>(
    current: Position,
    area: Rect,
    limit: Option<f64>,
    drift: f64,
    rng: &mut R,
) -> Option<Position> {
    if !area.is_finite() || !drift.is_finite() || !limit.map_or(true, f64::is_finite) {
        return None;
    }
    let spot = Position::new(
        rng.gen_range(area.x..=area.right()),
        rng.gen_range(area.y..=area.bottom()),
    );
    let spot = area.clamp(spot.offset(jitter(drift, rng), jitter(drift, rng)));
    match limit {
        Some(limit) if current.is_finite() => Some(current.step_toward(spot, limit)),
        _ => Some(spot),
    }
}
