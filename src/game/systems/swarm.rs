//! Per-tick swarm update: centroid, follow refresh and waypoint progression

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::game::state::{EntityId, World};
use crate::game::target::WaypointAdvance;
use crate::util::vec2::Vec2;

/// Positions of every followable entity, captured once per swarm update
pub fn position_snapshot(world: &World) -> FxHashMap<EntityId, Vec2> {
    let mut lookup = FxHashMap::default();
    lookup.reserve(world.swarms.len() + world.props.len());
    for swarm in world.swarms.values() {
        lookup.insert(swarm.id, swarm.position);
    }
    for prop in &world.props {
        lookup.insert(prop.id, prop.position);
    }
    lookup
}

/// Update every swarm in ascending ID order. Returns the number of
/// waypoint advances that happened this tick.
pub fn update(world: &mut World) -> usize {
    let ids = world.swarm_ids();
    let policy = world.policy;

    // Centroids first so followers read this tick's positions
    for id in &ids {
        let Some(centroid) = world.swarms.get(id).and_then(|s| world.member_centroid(s)) else {
            continue;
        };
        if let Some(swarm) = world.swarms.get_mut(id) {
            swarm.position = centroid;
        }
    }

    let lookup = position_snapshot(world);
    let mut advances = 0;

    for id in &ids {
        let Some(swarm) = world.swarms.get_mut(id) else {
            continue;
        };

        swarm.target.refresh(&lookup);

        if swarm.members.is_empty() {
            // Empty swarms sit on their target and never consume waypoints
            swarm.position = swarm.target.resolve(&lookup);
            continue;
        }

        let Some(waypoint) = swarm.target.active_waypoint() else {
            continue;
        };
        if swarm.position.distance_to(waypoint) < policy.waypoint_proximity {
            match swarm.target.advance(policy.collapse_waypoints) {
                WaypointAdvance::Advanced => {
                    advances += 1;
                    debug!("Swarm {} reached waypoint {:?}", swarm.id, waypoint);
                }
                WaypointAdvance::Collapsed => {
                    advances += 1;
                    debug!("Swarm {} finished its waypoint chain", swarm.id);
                }
                WaypointAdvance::Held | WaypointAdvance::NotApplicable => {}
            }
        }
    }

    advances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Specialization, SwarmPolicy};
    use crate::game::target::{Target, TargetSpec};

    #[test]
    fn test_centroid_and_counts() {
        let mut world = World::default();
        let swarm = world.allocate(TargetSpec::position(0.0, 0.0)).unwrap();
        let a = world.add_drone(Vec2::new(0.0, 0.0), Specialization::Scout);
        let b = world.add_drone(Vec2::new(10.0, 20.0), Specialization::Relay);
        world.enlist(a, swarm).unwrap();
        world.enlist(b, swarm).unwrap();

        update(&mut world);

        let swarm = world.swarm(swarm).unwrap();
        assert_eq!(swarm.position(), Vec2::new(5.0, 10.0));
        assert_eq!(swarm.specialization_counts()[&Specialization::Scout], 1);
        assert_eq!(swarm.specialization_counts()[&Specialization::Relay], 1);
        assert_eq!(swarm.specialization_counts()[&Specialization::Decoy], 0);
    }

    #[test]
    fn test_empty_swarm_sits_on_target() {
        let mut world = World::default();
        let car = world.add_car(Vec2::new(40.0, 40.0), 5.0, vec![Vec2::ZERO], 0.5);
        let swarm = world.allocate(TargetSpec::follow(car)).unwrap();

        world.props[0].position = Vec2::new(45.0, 40.0);
        update(&mut world);

        assert_eq!(world.swarm(swarm).unwrap().position(), Vec2::new(45.0, 40.0));
    }

    #[test]
    fn test_empty_swarm_does_not_advance_waypoints() {
        let mut world = World::default();
        let swarm = world
            .allocate(TargetSpec::waypoints(vec![Vec2::ZERO, Vec2::new(50.0, 0.0)], true))
            .unwrap();

        for _ in 0..5 {
            assert_eq!(update(&mut world), 0);
        }
        assert_eq!(
            world.swarm(swarm).unwrap().target().active_waypoint(),
            Some(Vec2::ZERO)
        );
    }

    #[test]
    fn test_two_point_cycle_never_empties() {
        let mut world = World::default();
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(100.0, 0.0);
        let swarm = world.allocate(TargetSpec::waypoints(vec![a, b], true)).unwrap();
        let drone = world.add_drone(a, Specialization::Scout);
        world.enlist(drone, swarm).unwrap();

        for i in 0..20 {
            // Teleport the lone member onto whichever point is active
            let active = world.swarm(swarm).unwrap().target().active_waypoint().unwrap();
            world.drones[0].position = active;
            assert_eq!(update(&mut world), 1, "iteration {}", i);

            match world.swarm(swarm).unwrap().target() {
                Target::Waypoints(chain) => assert_eq!(chain.len(), 2),
                other => panic!("cycling chain changed shape: {:?}", other),
            }
        }
    }

    #[test]
    fn test_chain_collapses_per_policy() {
        for collapse in [true, false] {
            let mut world = World::new(SwarmPolicy {
                collapse_waypoints: collapse,
                ..SwarmPolicy::default()
            });
            let end = Vec2::new(30.0, 30.0);
            let swarm = world.allocate(TargetSpec::waypoints(vec![end], false)).unwrap();
            let drone = world.add_drone(end, Specialization::Striker);
            world.enlist(drone, swarm).unwrap();

            update(&mut world);

            let target = world.swarm(swarm).unwrap().target();
            if collapse {
                assert_eq!(target, &Target::Point(end));
            } else {
                assert_eq!(target.active_waypoint(), Some(end));
            }
        }
    }
}
