//! What a swarm is moving toward
//!
//! A target is a closed set of variants dispatched by `match`: a fixed point,
//! a followed entity (another swarm or a prop) read live every tick, or an
//! ordered waypoint chain whose head is the active goal.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::game::state::EntityId;
use crate::util::vec2::Vec2;

/// Live position lookup for followed entities
pub trait PositionLookup {
    fn position_of(&self, id: EntityId) -> Option<Vec2>;
}

impl PositionLookup for rustc_hash::FxHashMap<EntityId, Vec2> {
    fn position_of(&self, id: EntityId) -> Option<Vec2> {
        self.get(&id).copied()
    }
}

/// Target as requested by a controller, before entity references are checked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSpec {
    Position { position: Vec2 },
    Follow { entity: EntityId },
    Waypoints { points: Vec<Vec2>, cycle: bool },
}

impl TargetSpec {
    pub fn position(x: f32, y: f32) -> Self {
        Self::Position {
            position: Vec2::new(x, y),
        }
    }

    pub fn follow(entity: EntityId) -> Self {
        Self::Follow { entity }
    }

    pub fn waypoints(points: Vec<Vec2>, cycle: bool) -> Self {
        Self::Waypoints { points, cycle }
    }
}

/// A followed entity with the last position it was seen at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowTarget {
    pub entity: EntityId,
    pub last_known: Vec2,
}

/// Ordered, never-empty sequence of points
#[derive(Debug, Clone, PartialEq)]
pub struct WaypointChain {
    points: VecDeque<Vec2>,
    cycle: bool,
}

impl WaypointChain {
    /// Returns `None` for an empty point list
    pub fn new(points: impl IntoIterator<Item = Vec2>, cycle: bool) -> Option<Self> {
        let points: VecDeque<Vec2> = points.into_iter().collect();
        if points.is_empty() {
            return None;
        }
        Some(Self { points, cycle })
    }

    /// The point currently being pursued
    pub fn active(&self) -> Vec2 {
        // Non-empty by construction, and advance() never pops the last point
        self.points.front().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_cycling(&self) -> bool {
        self.cycle
    }

    pub fn points(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.points.iter().copied()
    }

    /// Move to the next point. The popped head is re-appended when cycling.
    /// A single remaining point is never popped.
    fn advance(&mut self) -> bool {
        if self.points.len() < 2 {
            return false;
        }
        if let Some(head) = self.points.pop_front() {
            if self.cycle {
                self.points.push_back(head);
            }
        }
        true
    }
}

/// Outcome of asking a target to move past its active waypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointAdvance {
    /// Not a waypoint chain
    NotApplicable,
    /// Active point moved to the next in the chain
    Advanced,
    /// Last point reached; the chain became a fixed point
    Collapsed,
    /// Last point reached; the chain keeps holding it
    Held,
}

/// The goal a swarm currently pursues
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Point(Vec2),
    Follow(FollowTarget),
    Waypoints(WaypointChain),
}

/// Target shape for rendering
#[derive(Debug, Clone, PartialEq)]
pub enum TargetGeometry {
    Point(Vec2),
    Path(Vec<Vec2>),
}

impl Target {
    /// Position to seek this tick.
    ///
    /// A followed entity that no longer exists resolves to where it was last seen.
    pub fn resolve(&self, lookup: &impl PositionLookup) -> Vec2 {
        match self {
            Target::Point(position) => *position,
            Target::Follow(follow) => lookup
                .position_of(follow.entity)
                .unwrap_or(follow.last_known),
            Target::Waypoints(chain) => chain.active(),
        }
    }

    /// Cache the live position of a followed entity
    pub fn refresh(&mut self, lookup: &impl PositionLookup) {
        if let Target::Follow(follow) = self {
            if let Some(position) = lookup.position_of(follow.entity) {
                follow.last_known = position;
            }
        }
    }

    /// Active waypoint, if this is a chain
    pub fn active_waypoint(&self) -> Option<Vec2> {
        match self {
            Target::Waypoints(chain) => Some(chain.active()),
            _ => None,
        }
    }

    /// Entity this target follows, if any
    pub fn followed_entity(&self) -> Option<EntityId> {
        match self {
            Target::Follow(follow) => Some(follow.entity),
            _ => None,
        }
    }

    /// Step a waypoint chain past its active point.
    ///
    /// With `collapse` set, a chain down to its final point turns into
    /// `Target::Point`; otherwise the final point is held as a one-element chain.
    pub fn advance(&mut self, collapse: bool) -> WaypointAdvance {
        let Target::Waypoints(chain) = self else {
            return WaypointAdvance::NotApplicable;
        };

        if chain.advance() {
            WaypointAdvance::Advanced
        } else if collapse {
            let last = chain.active();
            *self = Target::Point(last);
            WaypointAdvance::Collapsed
        } else {
            WaypointAdvance::Held
        }
    }

    pub fn geometry(&self, lookup: &impl PositionLookup) -> TargetGeometry {
        match self {
            Target::Waypoints(chain) => TargetGeometry::Path(chain.points().collect()),
            _ => TargetGeometry::Point(self.resolve(lookup)),
        }
    }
}
