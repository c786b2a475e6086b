//! World state definitions and structures
//!
//! Contains all entities (drones, swarms, props) held in one owning `World`.
//! Drones live in an arena indexed by `DroneId`; swarms and props share one
//! monotonically increasing `EntityId` space so a follow target can name either.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::game::constants::{drone, swarm};
use crate::game::target::{PositionLookup, Target};
use crate::util::vec2::Vec2;

/// Identifier for swarms and props (opaque, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique swarm identifier
pub type SwarmId = EntityId;

/// Unique prop identifier
pub type PropId = EntityId;

/// Drone identifier (index into the world's drone arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DroneId(pub u32);

impl fmt::Display for DroneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drone role tag. Has no effect on steering; used for filtering and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    Scout,
    Striker,
    Relay,
    Decoy,
}

impl Specialization {
    pub const ALL: [Specialization; 4] = [
        Specialization::Scout,
        Specialization::Striker,
        Specialization::Relay,
        Specialization::Decoy,
    ];
}

/// Member count per specialization, with every specialization present
pub type SpecializationCounts = BTreeMap<Specialization, usize>;

fn empty_specialization_counts() -> SpecializationCounts {
    Specialization::ALL.iter().map(|&s| (s, 0)).collect()
}

/// A single steerable agent
#[derive(Debug, Clone, PartialEq)]
pub struct Drone {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub specialization: Specialization,
    /// Role a decoy poses as. Only set on `Decoy` drones.
    pub decoy_role: Option<Specialization>,
    /// Owning swarm. Only lifecycle operations write this.
    pub(crate) swarm: Option<SwarmId>,
    pub id: DroneId,
}

impl Drone {
    pub fn new(id: DroneId, position: Vec2) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius: drone::SIZE,
            specialization: Specialization::Scout,
            decoy_role: None,
            swarm: None,
            id,
        }
    }

    pub fn with_specialization(mut self, specialization: Specialization) -> Self {
        self.specialization = specialization;
        self
    }

    pub fn swarm(&self) -> Option<SwarmId> {
        self.swarm
    }

    /// Specialization shown to observers: a decoy's cover role, else the real one
    pub fn apparent_specialization(&self) -> Specialization {
        match (self.specialization, self.decoy_role) {
            (Specialization::Decoy, Some(role)) => role,
            (specialization, _) => specialization,
        }
    }

    /// Direction of travel in radians (for rendering)
    pub fn heading(&self) -> f32 {
        self.velocity.angle()
    }
}

/// A named group of drones sharing one target and encircling policy
#[derive(Debug, Clone)]
pub struct Swarm {
    pub id: SwarmId,
    /// Display color, derived from the ID
    pub color: [u8; 3],
    /// Centroid of the members, or the target position while empty
    pub(crate) position: Vec2,
    pub(crate) target: Target,
    pub(crate) encircling: bool,
    pub(crate) radius: f32,
    /// Forward index kept in step with each member's back-reference
    pub(crate) members: BTreeSet<DroneId>,
    pub(crate) specialization_counts: SpecializationCounts,
}

impl Swarm {
    pub fn new(id: SwarmId, target: Target, position: Vec2) -> Self {
        Self {
            id,
            color: swarm_color(id),
            position,
            target,
            encircling: false,
            radius: swarm::DEFAULT_ENCIRCLE_RADIUS,
            members: BTreeSet::new(),
            specialization_counts: empty_specialization_counts(),
        }
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn is_encircling(&self) -> bool {
        self.encircling
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in ascending drone ID order
    pub fn members(&self) -> impl Iterator<Item = DroneId> + '_ {
        self.members.iter().copied()
    }

    pub fn specialization_counts(&self) -> &SpecializationCounts {
        &self.specialization_counts
    }
}

/// Spread swarm colors around the hue wheel by golden-ratio steps
fn swarm_color(id: SwarmId) -> [u8; 3] {
    const GOLDEN_RATIO_CONJUGATE: f32 = 0.618_034;
    let hue = (id.0 as f32 * GOLDEN_RATIO_CONJUGATE).fract() * 6.0;
    let sector = hue.floor() as u8;
    let f = hue.fract();
    let (s, v) = (0.65_f32, 0.9_f32);
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Prop behavior
#[derive(Debug, Clone, PartialEq)]
pub enum PropKind {
    /// Static point of interest
    Landmark,
    /// Drives a closed route at constant speed
    Car {
        route: Vec<Vec2>,
        cursor: usize,
        speed: f32,
    },
}

/// Externally-owned entity that swarms can follow
#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub id: PropId,
    pub position: Vec2,
    pub size: f32,
    pub kind: PropKind,
}

impl Prop {
    pub fn landmark(id: PropId, position: Vec2, size: f32) -> Self {
        Self {
            id,
            position,
            size,
            kind: PropKind::Landmark,
        }
    }

    pub fn car(id: PropId, position: Vec2, size: f32, route: Vec<Vec2>, speed: f32) -> Self {
        Self {
            id,
            position,
            size,
            kind: PropKind::Car {
                route,
                cursor: 0,
                speed,
            },
        }
    }

    pub fn is_car(&self) -> bool {
        matches!(self.kind, PropKind::Car { .. })
    }
}

/// Swarm behavior policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmPolicy {
    /// Whether a waypoint chain down to its final point becomes a fixed point
    pub collapse_waypoints: bool,
    /// Centroid distance at which the active waypoint counts as reached
    pub waypoint_proximity: f32,
}

impl Default for SwarmPolicy {
    fn default() -> Self {
        Self {
            collapse_waypoints: true,
            waypoint_proximity: swarm::WAYPOINT_PROXIMITY,
        }
    }
}

/// The complete simulated world
#[derive(Debug, Clone, Default)]
pub struct World {
    pub(crate) drones: Vec<Drone>,
    pub(crate) swarms: HashMap<SwarmId, Swarm>,
    pub(crate) props: Vec<Prop>,
    pub(crate) policy: SwarmPolicy,
    next_entity_id: u64,
}

impl World {
    pub fn new(policy: SwarmPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn policy(&self) -> SwarmPolicy {
        self.policy
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Add an unassigned drone
    pub fn add_drone(&mut self, position: Vec2, specialization: Specialization) -> DroneId {
        let id = DroneId(self.drones.len() as u32);
        self.drones
            .push(Drone::new(id, position).with_specialization(specialization));
        id
    }

    /// Give a decoy the role it poses as. Returns false for missing or non-decoy drones.
    pub fn disguise_decoy(&mut self, id: DroneId, role: Specialization) -> bool {
        match self.drones.get_mut(id.0 as usize) {
            Some(drone) if drone.specialization == Specialization::Decoy => {
                drone.decoy_role = Some(role);
                true
            }
            _ => false,
        }
    }

    pub fn add_landmark(&mut self, position: Vec2, size: f32) -> PropId {
        let id = self.next_entity_id();
        self.props.push(Prop::landmark(id, position, size));
        id
    }

    pub fn add_car(&mut self, position: Vec2, size: f32, route: Vec<Vec2>, speed: f32) -> PropId {
        let id = self.next_entity_id();
        self.props.push(Prop::car(id, position, size, route, speed));
        id
    }

    pub fn drone(&self, id: DroneId) -> Option<&Drone> {
        self.drones.get(id.0 as usize)
    }

    /// All drones in ascending ID order
    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn drone_count(&self) -> usize {
        self.drones.len()
    }

    pub fn unassigned_drone_count(&self) -> usize {
        self.drones.iter().filter(|d| d.swarm.is_none()).count()
    }

    /// Get swarm by ID - O(1) with HashMap
    pub fn swarm(&self, id: SwarmId) -> Option<&Swarm> {
        self.swarms.get(&id)
    }

    pub fn contains_swarm(&self, id: SwarmId) -> bool {
        self.swarms.contains_key(&id)
    }

    pub fn swarm_count(&self) -> usize {
        self.swarms.len()
    }

    /// Swarm IDs in ascending order (the order swarms are updated and described in)
    pub fn swarm_ids(&self) -> Vec<SwarmId> {
        let mut ids: Vec<SwarmId> = self.swarms.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Swarms in ascending ID order
    pub fn swarms(&self) -> impl Iterator<Item = &Swarm> {
        self.swarm_ids().into_iter().filter_map(move |id| self.swarms.get(&id))
    }

    /// Mean position of a swarm's members, `None` while it has none
    pub fn member_centroid(&self, swarm: &Swarm) -> Option<Vec2> {
        if swarm.members.is_empty() {
            return None;
        }
        let mut sum = Vec2::ZERO;
        for member in &swarm.members {
            if let Some(drone) = self.drones.get(member.0 as usize) {
                sum += drone.position;
            }
        }
        Some(sum / swarm.members.len() as f32)
    }

    /// Recompute a swarm's position from its current members, falling back
    /// to its resolved target while empty
    pub(crate) fn refresh_swarm_position(&mut self, id: SwarmId) {
        let Some(swarm) = self.swarms.get(&id) else {
            return;
        };
        let position = self
            .member_centroid(swarm)
            .unwrap_or_else(|| swarm.target.resolve(&*self));
        if let Some(swarm) = self.swarms.get_mut(&id) {
            swarm.position = position;
        }
    }

    pub fn prop(&self, id: PropId) -> Option<&Prop> {
        self.props.iter().find(|p| p.id == id)
    }

    pub fn props(&self) -> &[Prop] {
        &self.props
    }
}

impl PositionLookup for World {
    fn position_of(&self, id: EntityId) -> Option<Vec2> {
        self.swarms
            .get(&id)
            .map(|s| s.position)
            .or_else(|| self.prop(id).map(|p| p.position))
    }
}
