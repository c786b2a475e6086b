//! Swarm lifecycle: allocation, deallocation and membership mutation
//!
//! Every operation checks all of its preconditions before touching state, so
//! a failed call leaves the world exactly as it was. Membership is stored
//! twice (each drone's back-reference and each swarm's forward index) and the
//! two are only ever written together, in `move_drone`.

use smallvec::SmallVec;
use tracing::{debug, info};

use crate::game::constants::sim;
use crate::game::state::{DroneId, EntityId, Swarm, SwarmId, World};
use crate::game::target::{FollowTarget, PositionLookup, Target, TargetSpec, WaypointChain};
use crate::util::vec2::Vec2;

/// Lifecycle operation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SwarmError {
    #[error("Swarm not found: {0}")]
    SwarmNotFound(SwarmId),
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),
    #[error("Drone not found: {0}")]
    DroneNotFound(DroneId),
    #[error("Swarm {0} cannot follow itself")]
    SelfFollow(SwarmId),
    #[error("Source and destination are the same swarm: {0}")]
    SameSwarm(SwarmId),
    #[error("Waypoint chain must contain at least one point")]
    EmptyWaypoints,
    #[error("Target coordinates must be finite")]
    NonFiniteTarget,
    #[error("Target coordinates must lie within ±{0}")]
    TargetOutOfRange(f32),
    #[error("Encircle radius must be finite and non-negative, got {0}")]
    InvalidRadius(f32),
}

impl SwarmError {
    /// Whether the operation referenced an ID with no matching entity
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SwarmError::SwarmNotFound(_) | SwarmError::EntityNotFound(_) | SwarmError::DroneNotFound(_)
        )
    }
}

impl World {
    /// Create a new empty swarm bound to `spec`
    pub fn allocate(&mut self, spec: TargetSpec) -> Result<SwarmId, SwarmError> {
        let target = self.build_target(spec, None)?;
        let id = self.next_entity_id();
        let position = target.resolve(&*self);
        self.swarms.insert(id, Swarm::new(id, target, position));
        info!("Allocated swarm {}", id);
        Ok(id)
    }

    /// Remove a swarm, unassigning its drones.
    ///
    /// Swarms following the removed one are redirected to a fixed point at
    /// its last position so no target is left referencing a dead ID.
    pub fn deallocate(&mut self, swarm_id: SwarmId) -> Result<(), SwarmError> {
        let swarm = self
            .swarms
            .remove(&swarm_id)
            .ok_or(SwarmError::SwarmNotFound(swarm_id))?;

        for drone_id in &swarm.members {
            if let Some(drone) = self.drones.get_mut(drone_id.0 as usize) {
                drone.swarm = None;
            }
        }

        for follower in self.swarms.values_mut() {
            if follower.target.followed_entity() == Some(swarm_id) {
                debug!(
                    "Swarm {} lost its followed swarm {}, holding at last position",
                    follower.id, swarm_id
                );
                follower.target = Target::Point(swarm.position);
            }
        }

        info!(
            "Deallocated swarm {} ({} drones unassigned)",
            swarm_id,
            swarm.members.len()
        );
        Ok(())
    }

    /// Move up to `count` drones from `source` to `dest`, lowest drone IDs first.
    ///
    /// If the source had members and every one of them was moved, the source
    /// is deallocated. Returns the number of drones moved.
    pub fn reassign(
        &mut self,
        source: SwarmId,
        dest: SwarmId,
        count: usize,
    ) -> Result<usize, SwarmError> {
        self.require_swarm(source)?;
        self.require_swarm(dest)?;
        if source == dest {
            return Err(SwarmError::SameSwarm(source));
        }

        let (picked, source_emptied) = {
            let swarm = &self.swarms[&source];
            let picked: SmallVec<[DroneId; 32]> = swarm.members.iter().copied().take(count).collect();
            let emptied = !picked.is_empty() && picked.len() == swarm.members.len();
            (picked, emptied)
        };

        for &drone_id in &picked {
            self.move_drone(drone_id, Some(dest));
        }
        if !source_emptied {
            self.refresh_swarm_position(source);
        }
        self.refresh_swarm_position(dest);

        debug!("Reassigned {} drones from swarm {} to {}", picked.len(), source, dest);

        if source_emptied {
            self.deallocate(source)?;
        }

        Ok(picked.len())
    }

    /// Move every drone from `source` into `dest`, then remove `source`
    pub fn merge(&mut self, source: SwarmId, dest: SwarmId) -> Result<SwarmId, SwarmError> {
        self.require_swarm(source)?;
        self.require_swarm(dest)?;
        if source == dest {
            return Err(SwarmError::SameSwarm(source));
        }

        let count = self.swarms[&source].member_count();
        self.reassign(source, dest, count)?;

        // reassign already removed a non-empty source
        if self.contains_swarm(source) {
            self.deallocate(source)?;
        }

        info!("Merged swarm {} into {}", source, dest);
        Ok(dest)
    }

    /// Split up to `count` drones off `source` into a new swarm pursuing `spec`.
    ///
    /// The new swarm inherits the source's encircling flag and radius.
    pub fn fork(
        &mut self,
        source: SwarmId,
        count: usize,
        spec: TargetSpec,
    ) -> Result<SwarmId, SwarmError> {
        self.require_swarm(source)?;
        let target = self.build_target(spec, None)?;

        let (encircling, radius) = {
            let swarm = &self.swarms[&source];
            (swarm.encircling, swarm.radius)
        };

        let id = self.next_entity_id();
        let position = target.resolve(&*self);
        let mut forked = Swarm::new(id, target, position);
        forked.encircling = encircling;
        forked.radius = radius;
        self.swarms.insert(id, forked);

        let moved = self.reassign(source, id, count)?;
        info!("Forked swarm {} from {} with {} drones", id, source, moved);
        Ok(id)
    }

    /// Replace a swarm's target
    pub fn retarget(&mut self, swarm_id: SwarmId, spec: TargetSpec) -> Result<(), SwarmError> {
        self.require_swarm(swarm_id)?;
        let target = self.build_target(spec, Some(swarm_id))?;
        if let Some(swarm) = self.swarms.get_mut(&swarm_id) {
            swarm.target = target;
        }
        debug!("Retargeted swarm {}", swarm_id);
        Ok(())
    }

    /// Set encircling mode and radius. Updating only the radius of an
    /// already-encircling swarm is valid. Returns the resulting flag.
    pub fn set_encircle(
        &mut self,
        swarm_id: SwarmId,
        enabled: bool,
        radius: f32,
    ) -> Result<bool, SwarmError> {
        let swarm = self
            .swarms
            .get_mut(&swarm_id)
            .ok_or(SwarmError::SwarmNotFound(swarm_id))?;
        if !radius.is_finite() || radius < 0.0 {
            return Err(SwarmError::InvalidRadius(radius));
        }

        swarm.encircling = enabled;
        swarm.radius = radius;
        debug!("Swarm {} encircling={} radius={}", swarm_id, enabled, radius);
        Ok(swarm.encircling)
    }

    /// Put a single drone into `swarm_id`, leaving whatever swarm it was in.
    /// Used when populating a fresh world.
    pub fn enlist(&mut self, drone_id: DroneId, swarm_id: SwarmId) -> Result<(), SwarmError> {
        if self.drone(drone_id).is_none() {
            return Err(SwarmError::DroneNotFound(drone_id));
        }
        self.require_swarm(swarm_id)?;
        let previous = self.drones[drone_id.0 as usize].swarm;
        self.move_drone(drone_id, Some(swarm_id));
        if let Some(previous) = previous {
            self.refresh_swarm_position(previous);
        }
        self.refresh_swarm_position(swarm_id);
        Ok(())
    }

    fn require_swarm(&self, id: SwarmId) -> Result<(), SwarmError> {
        if self.swarms.contains_key(&id) {
            Ok(())
        } else {
            Err(SwarmError::SwarmNotFound(id))
        }
    }

    /// The only place membership is written: back-reference, forward index
    /// and specialization counts together
    fn move_drone(&mut self, drone_id: DroneId, dest: Option<SwarmId>) {
        let Some(drone) = self.drones.get_mut(drone_id.0 as usize) else {
            return;
        };

        if let Some(previous) = drone.swarm.take() {
            if let Some(swarm) = self.swarms.get_mut(&previous) {
                if swarm.members.remove(&drone_id) {
                    if let Some(count) = swarm.specialization_counts.get_mut(&drone.specialization) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }

        if let Some(dest) = dest {
            if let Some(swarm) = self.swarms.get_mut(&dest) {
                if swarm.members.insert(drone_id) {
                    *swarm
                        .specialization_counts
                        .entry(drone.specialization)
                        .or_insert(0) += 1;
                }
                drone.swarm = Some(dest);
            }
        }
    }

    /// Validate a controller target and resolve entity references.
    /// `owner` is the swarm that will pursue the target, if it already exists.
    fn build_target(&self, spec: TargetSpec, owner: Option<SwarmId>) -> Result<Target, SwarmError> {
        match spec {
            TargetSpec::Position { position } => {
                require_in_bounds(position)?;
                Ok(Target::Point(position))
            }
            TargetSpec::Follow { entity } => {
                if owner == Some(entity) {
                    return Err(SwarmError::SelfFollow(entity));
                }
                let last_known = self
                    .position_of(entity)
                    .ok_or(SwarmError::EntityNotFound(entity))?;
                Ok(Target::Follow(FollowTarget { entity, last_known }))
            }
            TargetSpec::Waypoints { points, cycle } => {
                for point in &points {
                    require_in_bounds(*point)?;
                }
                WaypointChain::new(points, cycle)
                    .map(Target::Waypoints)
                    .ok_or(SwarmError::EmptyWaypoints)
            }
        }
    }

    /// Check that back-references and forward indexes agree and reference live swarms
    pub fn membership_consistent(&self) -> bool {
        let back_refs_ok = self.drones.iter().all(|drone| match drone.swarm {
            None => true,
            Some(id) => self
                .swarms
                .get(&id)
                .is_some_and(|s| s.members.contains(&drone.id)),
        });

        let forward_ok = self.swarms.values().all(|swarm| {
            swarm.members.iter().all(|member| {
                self.drone(*member)
                    .is_some_and(|d| d.swarm == Some(swarm.id))
            })
        });

        back_refs_ok && forward_ok
    }
}

fn require_in_bounds(point: Vec2) -> Result<(), SwarmError> {
    if !point.is_finite() {
        return Err(SwarmError::NonFiniteTarget);
    }
    if point.x.abs() > sim::COORDINATE_LIMIT || point.y.abs() > sim::COORDINATE_LIMIT {
        return Err(SwarmError::TargetOutOfRange(sim::COORDINATE_LIMIT));
    }
    Ok(())
}
