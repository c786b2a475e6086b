//! Prop movement. Landmarks are static; cars drive their closed route.

use crate::game::state::{PropKind, World};

/// Advance every car by one tick
pub fn update(world: &mut World) {
    for prop in &mut world.props {
        let PropKind::Car {
            route,
            cursor,
            speed,
        } = &mut prop.kind
        else {
            continue;
        };
        if route.is_empty() {
            continue;
        }

        let waypoint = route[*cursor % route.len()];
        let (direction, distance) = (waypoint - prop.position).normalize_with_length();

        if distance < prop.size {
            *cursor = (*cursor + 1) % route.len();
        } else {
            prop.position += direction * *speed;
        }
    }
}
