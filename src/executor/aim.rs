/// Aim geometry: turn one target point into absolute mouse waypoints.
///
/// The offset of the target from screen center is magnified by `multiplier`.
/// When the magnified destination falls off-screen the motion is split: the
/// first waypoint stops at the screen edge, and the remainder of the gesture is
/// replayed from the center as a second waypoint.
use serde::{Deserialize, Serialize};

use crate::perception::types::{Point, ScreenSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: i32,
    pub y: i32,
}

pub fn plan(target: Point, center: Point, multiplier: f64, screen: ScreenSize) -> Vec<Waypoint> {
    let (max_x, max_y) = (screen.width as f64, screen.height as f64);
    let ideal_x = scale_axis(target.x as f64, center.x as f64, multiplier);
    let ideal_y = scale_axis(target.y as f64, center.y as f64, multiplier);

    let in_bounds = (0.0..=max_x).contains(&ideal_x) && (0.0..=max_y).contains(&ideal_y);
    if in_bounds {
        return vec![waypoint(ideal_x, ideal_y)];
    }

    // Both axes are clamped so the intermediate position never leaves the screen.
    let first_x = ideal_x.clamp(0.0, max_x);
    let first_y = ideal_y.clamp(0.0, max_y);
    let mut out = vec![waypoint(first_x, first_y)];

    if first_x != ideal_x || first_y != ideal_y {
        let second_x = (center.x as f64 + (ideal_x - first_x)).clamp(0.0, max_x);
        let second_y = (center.y as f64 + (ideal_y - first_y)).clamp(0.0, max_y);
        out.push(waypoint(second_x, second_y));
    }

    tracing::debug!(
        target = %target,
        ideal_x,
        ideal_y,
        waypoints = ?out,
        "aim split at screen edge"
    );
    out
}

/// Convert waypoints planned in captured (physical) pixels into the logical
/// coordinates absolute mouse moves use on a scaled display.
pub fn to_logical(waypoints: &[Waypoint], scale_factor: f64) -> Vec<Waypoint> {
    if !(scale_factor.is_finite() && scale_factor > 0.0) || scale_factor == 1.0 {
        return waypoints.to_vec();
    }
    waypoints
        .iter()
        .map(|wp| waypoint(wp.x as f64 / scale_factor, wp.y as f64 / scale_factor))
        .collect()
}

fn scale_axis(p: f64, c: f64, multiplier: f64) -> f64 {
    if p >= c {
        c + (p - c) * multiplier
    } else {
        c - (c - p) * multiplier
    }
}

fn waypoint(x: f64, y: f64) -> Waypoint {
    Waypoint {
        x: x.trunc() as i32,
        y: y.trunc() as i32,
    }
}
