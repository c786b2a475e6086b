//! Boids steering: separation, alignment and seek/encircle
//!
//! Each drone's next state depends only on its own state, the grid snapshot
//! and its swarm's goal for the tick, so the whole population is computed in
//! parallel and applied afterwards in drone ID order.

use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::game::constants::steering;
use crate::game::spatial::DroneGrid;
use crate::game::state::{Drone, DroneId, SwarmId, World};
use crate::util::vec2::Vec2;

/// Tunable steering parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringParams {
    pub separation_radius: f32,
    pub alignment_radius: f32,
    pub separation_cap: f32,
    pub alignment_correction: f32,
    pub cruise_speed: f32,
    pub max_speed: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub seek_weight: f32,
    pub seek_saturation_distance: f32,
    pub encircle_inner_falloff: f32,
    pub encircle_outer_falloff: f32,
    pub seek_strength_scale: f32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            separation_radius: steering::SEPARATION_RADIUS,
            alignment_radius: steering::ALIGNMENT_RADIUS,
            separation_cap: steering::SEPARATION_CAP,
            alignment_correction: steering::ALIGNMENT_CORRECTION,
            cruise_speed: steering::CRUISE_SPEED,
            max_speed: steering::MAX_SPEED,
            separation_weight: steering::SEPARATION_WEIGHT,
            alignment_weight: steering::ALIGNMENT_WEIGHT,
            seek_weight: steering::SEEK_WEIGHT,
            seek_saturation_distance: steering::SEEK_SATURATION_DISTANCE,
            encircle_inner_falloff: steering::ENCIRCLE_INNER_FALLOFF,
            encircle_outer_falloff: steering::ENCIRCLE_OUTER_FALLOFF,
            seek_strength_scale: steering::SEEK_STRENGTH_SCALE,
        }
    }
}

impl SteeringParams {
    /// Largest distance at which one drone influences another
    pub fn interaction_radius(&self) -> f32 {
        self.separation_radius.max(self.alignment_radius)
    }
}

/// What a swarm's members steer toward this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmGoal {
    pub target: Vec2,
    pub encircling: bool,
    pub radius: f32,
}

/// Unweighted steering components
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringForces {
    pub separation: Vec2,
    pub alignment: Vec2,
    pub seek: Vec2,
}

impl SteeringForces {
    pub fn blend(&self, params: &SteeringParams) -> Vec2 {
        self.separation * params.separation_weight
            + self.alignment * params.alignment_weight
            + self.seek * params.seek_weight
    }
}

/// Seek strength at `distance` from the goal.
///
/// Negative values push away from the target (inside an encircle radius).
pub fn seek_strength(distance: f32, goal: &SwarmGoal, params: &SteeringParams) -> f32 {
    let strength = if goal.encircling {
        if distance < goal.radius {
            -((goal.radius - distance) / params.encircle_inner_falloff).clamp(0.0, 1.0)
        } else {
            ((distance - goal.radius) / params.encircle_outer_falloff).clamp(0.0, 1.0)
        }
    } else {
        (distance / params.seek_saturation_distance).clamp(0.0, 1.0)
    };
    strength * params.seek_strength_scale
}

/// Separation magnitude for a pair whose radii sum to `min_distance`
pub fn separation_magnitude(distance_sq: f32, min_distance: f32, params: &SteeringParams) -> f32 {
    let min_sq = min_distance * min_distance;
    if distance_sq <= min_sq {
        return params.separation_cap;
    }
    let max_sq = params.separation_radius * params.separation_radius;
    let magnitude = (max_sq - min_sq) / (distance_sq - min_sq).abs() - 1.0;
    magnitude.clamp(0.0, params.separation_cap)
}

/// Push direction for two drones at the same position.
///
/// The axis is derived from the lower ID of the pair; the lower ID pushes
/// along it and the higher ID against it.
fn coincident_axis(own: DroneId, other: DroneId) -> Vec2 {
    const GOLDEN_ANGLE: f32 = 2.399_963;
    let lower = own.min(other);
    let axis = Vec2::from_angle(lower.0 as f32 * GOLDEN_ANGLE);
    if own < other {
        axis
    } else {
        -axis
    }
}

/// Compute the three steering components for one drone
pub fn compute_forces(
    drone: &Drone,
    grid: &DroneGrid,
    goal: &SwarmGoal,
    params: &SteeringParams,
) -> SteeringForces {
    let separation_sq = params.separation_radius * params.separation_radius;
    let alignment_sq = params.alignment_radius * params.alignment_radius;

    let mut separation = Vec2::ZERO;
    let mut separation_count = 0u32;
    let mut heading_sum = Vec2::ZERO;
    let mut alignment_count = 0u32;

    for neighbor in grid.neighbors(drone.position) {
        if neighbor.id == drone.id {
            continue;
        }

        let offset = drone.position - neighbor.position;
        let distance_sq = offset.length_sq();

        if distance_sq < separation_sq {
            let direction = if distance_sq > 0.0 {
                offset * (1.0 / distance_sq.sqrt())
            } else {
                coincident_axis(drone.id, neighbor.id)
            };
            let magnitude =
                separation_magnitude(distance_sq, drone.radius + neighbor.radius, params);
            separation += direction * magnitude;
            separation_count += 1;
        }

        if distance_sq < alignment_sq {
            heading_sum += neighbor.velocity;
            alignment_count += 1;
        }
    }

    let mut forces = SteeringForces::default();

    if separation_count > 0 {
        forces.separation = separation / separation_count as f32;
    }

    if alignment_count > 0 {
        let average = heading_sum / alignment_count as f32;
        forces.alignment = (average.with_length(params.cruise_speed) - drone.velocity)
            .clamp_length(params.alignment_correction);
    }

    let to_goal = goal.target - drone.position;
    let (direction, distance) = to_goal.normalize_with_length();
    if distance > 0.0 {
        forces.seek = direction * params.cruise_speed * seek_strength(distance, goal, params);
    }

    forces
}

/// Next (velocity, position) for a drone. Drones without a goal stop in place.
pub fn step(
    drone: &Drone,
    grid: &DroneGrid,
    goal: Option<&SwarmGoal>,
    params: &SteeringParams,
) -> (Vec2, Vec2) {
    let Some(goal) = goal else {
        return (Vec2::ZERO, drone.position);
    };

    let steer = compute_forces(drone, grid, goal, params).blend(params);
    let velocity = (drone.velocity + steer).clamp_length(params.max_speed);
    (velocity, drone.position + velocity)
}

/// Advance a single drone in place.
/// Returns false if the result was non-finite and discarded.
pub fn update_drone(
    drone: &mut Drone,
    grid: &DroneGrid,
    goal: Option<&SwarmGoal>,
    params: &SteeringParams,
) -> bool {
    let (velocity, position) = step(drone, grid, goal, params);
    apply(drone, velocity, position)
}

/// Advance every drone against the grid snapshot.
///
/// Uses rayon for the per-drone computation, then applies results
/// sequentially in drone ID order. Returns the number of drones whose
/// result was discarded as non-finite.
pub fn update_all(
    world: &mut World,
    grid: &DroneGrid,
    goals: &FxHashMap<SwarmId, SwarmGoal>,
    params: &SteeringParams,
) -> usize {
    let results: Vec<(Vec2, Vec2)> = world
        .drones
        .par_iter()
        .map(|drone| {
            let goal = drone.swarm.and_then(|id| goals.get(&id));
            step(drone, grid, goal, params)
        })
        .collect();

    let mut sanitized = 0;
    for (drone, (velocity, position)) in world.drones.iter_mut().zip(results) {
        if !apply(drone, velocity, position) {
            sanitized += 1;
        }
    }
    sanitized
}

fn apply(drone: &mut Drone, velocity: Vec2, position: Vec2) -> bool {
    if velocity.is_finite() && position.is_finite() {
        drone.velocity = velocity;
        drone.position = position;
        true
    } else {
        warn!("Drone {} produced non-finite state, holding position", drone.id);
        drone.velocity = Vec2::ZERO;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_at(x: f32, y: f32) -> SwarmGoal {
        SwarmGoal {
            target: Vec2::new(x, y),
            encircling: false,
            radius: 50.0,
        }
    }

    fn grid_of(drones: &[Drone]) -> DroneGrid {
        let mut grid = DroneGrid::default();
        grid.rebuild(drones.iter());
        grid
    }

    #[test]
    fn test_unassigned_drone_idles() {
        let mut drone = Drone::new(DroneId(0), Vec2::new(5.0, 5.0));
        drone.velocity = Vec2::new(1.0, 0.0);
        let grid = grid_of(&[drone.clone()]);

        assert!(update_drone(&mut drone, &grid, None, &SteeringParams::default()));
        assert_eq!(drone.velocity, Vec2::ZERO);
        assert_eq!(drone.position, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn test_lone_drone_seeks_goal() {
        let params = SteeringParams::default();
        let mut drone = Drone::new(DroneId(0), Vec2::ZERO);
        let grid = grid_of(&[drone.clone()]);

        let forces = compute_forces(&drone, &grid, &goal_at(100.0, 0.0), &params);
        assert_eq!(forces.separation, Vec2::ZERO);
        assert_eq!(forces.alignment, Vec2::ZERO);
        assert!((forces.seek.x - 0.25).abs() < 1e-6);

        update_drone(&mut drone, &grid, Some(&goal_at(100.0, 0.0)), &params);
        assert!(drone.position.x > 0.0);
        assert!(drone.velocity.length() <= params.max_speed + 1e-6);
    }

    #[test]
    fn test_seek_zero_at_target() {
        let drone = Drone::new(DroneId(0), Vec2::new(3.0, 3.0));
        let grid = grid_of(&[drone.clone()]);
        let forces = compute_forces(&drone, &grid, &goal_at(3.0, 3.0), &SteeringParams::default());
        assert_eq!(forces.seek, Vec2::ZERO);
    }

    #[test]
    fn test_seek_strength_saturates() {
        let params = SteeringParams::default();
        let goal = goal_at(0.0, 0.0);
        assert_eq!(seek_strength(400.0, &goal, &params), params.seek_strength_scale);
        assert!((seek_strength(100.0, &goal, &params) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_encircle_strength_sign() {
        let params = SteeringParams::default();
        let goal = SwarmGoal {
            target: Vec2::ZERO,
            encircling: true,
            radius: 50.0,
        };

        assert!(seek_strength(25.0, &goal, &params) < 0.0);
        assert!(seek_strength(100.0, &goal, &params) > 0.0);
        assert_eq!(seek_strength(50.0, &goal, &params), 0.0);
        // Deep inside, the outward push saturates
        assert_eq!(seek_strength(0.0, &goal, &params), -params.seek_strength_scale);
    }

    #[test]
    fn test_separation_magnitude_curve() {
        let params = SteeringParams::default();
        let min = 4.0;

        assert_eq!(separation_magnitude(0.0, min, &params), params.separation_cap);
        assert_eq!(separation_magnitude(min * min, min, &params), params.separation_cap);
        // Vanishes at the separation radius
        let at_edge = separation_magnitude(params.separation_radius.powi(2), min, &params);
        assert!(at_edge.abs() < 1e-6);

        let near = separation_magnitude(36.0, min, &params);
        let far = separation_magnitude(144.0, min, &params);
        assert!(near > far);
    }

    #[test]
    fn test_zero_distance_separation_is_capped_and_opposed() {
        let params = SteeringParams::default();
        let a = Drone::new(DroneId(3), Vec2::new(50.0, 50.0));
        let b = Drone::new(DroneId(8), Vec2::new(50.0, 50.0));
        let grid = grid_of(&[a.clone(), b.clone()]);
        let goal = goal_at(50.0, 50.0);

        let fa = compute_forces(&a, &grid, &goal, &params);
        let fb = compute_forces(&b, &grid, &goal, &params);

        assert!(fa.separation.is_finite());
        assert!((fa.separation.length() - params.separation_cap).abs() < 1e-4);
        assert!((fb.separation.length() - params.separation_cap).abs() < 1e-4);
        assert!((fa.separation + fb.separation).length() < 1e-4);
    }

    #[test]
    fn test_neighbors_push_apart() {
        let params = SteeringParams::default();
        let a = Drone::new(DroneId(0), Vec2::new(0.0, 0.0));
        let b = Drone::new(DroneId(1), Vec2::new(6.0, 0.0));
        let grid = grid_of(&[a.clone(), b.clone()]);
        let goal = goal_at(3.0, 0.0);

        let fa = compute_forces(&a, &grid, &goal, &params);
        assert!(fa.separation.x < 0.0);
        let fb = compute_forces(&b, &grid, &goal, &params);
        assert!(fb.separation.x > 0.0);
    }

    #[test]
    fn test_alignment_clamped() {
        let params = SteeringParams::default();
        let a = Drone::new(DroneId(0), Vec2::ZERO);
        let mut b = Drone::new(DroneId(1), Vec2::new(10.0, 0.0));
        b.velocity = Vec2::new(0.0, 1.0);
        let grid = grid_of(&[a.clone(), b]);

        let forces = compute_forces(&a, &grid, &goal_at(0.0, 0.0), &params);
        assert!((forces.alignment.length() - params.alignment_correction).abs() < 1e-6);
        assert!(forces.alignment.y > 0.0);
    }

    #[test]
    fn test_update_all_matches_sequential() {
        let params = SteeringParams::default();
        let mut world = World::default();
        let swarm = world
            .allocate(crate::game::target::TargetSpec::position(200.0, 200.0))
            .unwrap();
        for i in 0..40 {
            let id = world.add_drone(
                Vec2::new((i % 8) as f32 * 3.0, (i / 8) as f32 * 3.0),
                crate::game::state::Specialization::Scout,
            );
            world.enlist(id, swarm).unwrap();
        }

        let mut goals = FxHashMap::default();
        goals.insert(swarm, goal_at(200.0, 200.0));
        let grid = grid_of(world.drones());

        let expected: Vec<(Vec2, Vec2)> = world
            .drones()
            .iter()
            .map(|d| step(d, &grid, goals.get(&swarm), &params))
            .collect();

        assert_eq!(update_all(&mut world, &grid, &goals, &params), 0);
        for (drone, (velocity, position)) in world.drones().iter().zip(expected) {
            assert_eq!(drone.velocity, velocity);
            assert_eq!(drone.position, position);
        }
    }

    #[test]
    fn test_non_finite_result_discarded() {
        let mut drone = Drone::new(DroneId(0), Vec2::new(1.0, 1.0));
        drone.velocity = Vec2::new(0.5, 0.0);
        assert!(!apply(&mut drone, Vec2::new(f32::NAN, 0.0), Vec2::new(2.0, 1.0)));
        assert_eq!(drone.velocity, Vec2::ZERO);
        assert_eq!(drone.position, Vec2::new(1.0, 1.0));
    }
}
