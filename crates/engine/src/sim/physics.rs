use crate::world::World;

use super::math::{Rect, Vec2};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SweepResult {
    /// Displacement actually applied.
    pub delta: Vec2,
    pub blocked_x: bool,
    pub blocked_y: bool,
    /// Set when one of the extra obstacles stopped the body.
    pub hit_obstacle: bool,
}

/// Moves `body` by `delta` one axis at a time, stopping flush against solid
/// tiles, `obstacles`, and the world bounds. Solids the body already overlaps
/// do not block, so a body that starts embedded can walk out.
pub fn sweep(world: &World, body: Rect, delta: Vec2, obstacles: &[Rect]) -> SweepResult {
    let mut result = SweepResult::default();
    let mut current = body;

    if delta.x != 0.0 {
        let (dx, hit_obstacle) = sweep_axis(world, &current, delta.x, Axis::X, obstacles);
        result.blocked_x = dx != delta.x;
        result.hit_obstacle |= hit_obstacle;
        result.delta.x = dx;
        current = current.translated(Vec2::new(dx, 0.0));
    }
    if delta.y != 0.0 {
        let (dy, hit_obstacle) = sweep_axis(world, &current, delta.y, Axis::Y, obstacles);
        result.blocked_y = dy != delta.y;
        result.hit_obstacle |= hit_obstacle;
        result.delta.y = dy;
    }
    result
}

/// Smallest push that moves `body` out of `obstacle`, or `None` when they do not overlap.
pub fn penetration(body: &Rect, obstacle: &Rect) -> Option<Vec2> {
    if !body.overlaps(obstacle) {
        return None;
    }
    let push_left = obstacle.left() - body.right();
    let push_right = obstacle.right() - body.left();
    let push_up = obstacle.top() - body.bottom();
    let push_down = obstacle.bottom() - body.top();

    let x = if push_right < -push_left {
        push_right
    } else {
        push_left
    };
    let y = if push_down < -push_up {
        push_down
    } else {
        push_up
    };
    if x.abs() <= y.abs() {
        Some(Vec2::new(x, 0.0))
    } else {
        Some(Vec2::new(0.0, y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    X,
    Y,
}

fn sweep_axis(
    world: &World,
    body: &Rect,
    amount: f32,
    axis: Axis,
    obstacles: &[Rect],
) -> (f32, bool) {
    let step = match axis {
        Axis::X => Vec2::new(amount, 0.0),
        Axis::Y => Vec2::new(0.0, amount),
    };
    let swept = body.union(&body.translated(step));
    let mut allowed = amount;
    let mut hit_obstacle = false;

    let blockers = world
        .solid_tiles_overlapping(&swept)
        .into_iter()
        .map(|rect| (rect, false))
        .chain(obstacles.iter().map(|rect| (*rect, true)));

    for (solid, is_obstacle) in blockers {
        if !solid.overlaps(&swept) || solid.overlaps(body) {
            continue;
        }
        let limit = match (axis, amount > 0.0) {
            (Axis::X, true) => solid.left() - body.right(),
            (Axis::X, false) => solid.right() - body.left(),
            (Axis::Y, true) => solid.top() - body.bottom(),
            (Axis::Y, false) => solid.bottom() - body.top(),
        };
        let tighter = if amount > 0.0 {
            limit < allowed
        } else {
            limit > allowed
        };
        if tighter {
            allowed = limit;
            hit_obstacle = is_obstacle;
        } else if limit == allowed && is_obstacle {
            hit_obstacle = true;
        }
    }

    let bounds = world.bounds();
    if bounds.size.x > 0.0 && bounds.size.y > 0.0 {
        let (low, high, start, end) = match axis {
            Axis::X => (bounds.left(), bounds.right(), body.left(), body.right()),
            Axis::Y => (bounds.top(), bounds.bottom(), body.top(), body.bottom()),
        };
        if allowed > 0.0 && end + allowed > high {
            allowed = (high - end).max(0.0);
            hit_obstacle = false;
        } else if allowed < 0.0 && start + allowed < low {
            allowed = (low - start).min(0.0);
            hit_obstacle = false;
        }
    }

    (allowed, hit_obstacle)
}
