//! Controller wire protocol
//!
//! Requests are `{"command": <name>, "args": {...}}` envelopes. Replies are
//! `{"result": <value>}` or `{"error": {"kind": ..., "message": ...}}`.
//! Environment descriptions round positions to whole units and describe
//! followed swarms shallowly so mutual follows never recurse.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::command_queue::CommandQueueError;
use crate::game::commands::{Command, CommandOutput};
use crate::game::lifecycle::SwarmError;
use crate::game::state::{EntityId, Prop, PropKind, SpecializationCounts, Swarm, World};
use crate::game::target::{Target, TargetSpec};
use crate::util::vec2::Vec2;

/// Incoming request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default)]
    pub args: Value,
}

/// Errors decoding an envelope into a command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },
    #[error("Malformed request: {0}")]
    Malformed(String),
}

#[derive(Deserialize)]
struct SwarmArgs {
    swarm_id: EntityId,
}

#[derive(Deserialize)]
struct PositionArgs {
    x: f32,
    y: f32,
}

#[derive(Deserialize)]
struct FollowArgs {
    target_id: EntityId,
}

#[derive(Deserialize)]
struct WaypointArgs {
    waypoints: Vec<Vec2>,
    #[serde(default)]
    cycle: bool,
}

#[derive(Deserialize)]
struct ReassignArgs {
    source_swarm_id: EntityId,
    target_swarm_id: EntityId,
    num_drones: usize,
}

#[derive(Deserialize)]
struct MergeArgs {
    source_swarm_id: EntityId,
    target_swarm_id: EntityId,
}

#[derive(Deserialize)]
struct ForkArgs {
    source_swarm_id: EntityId,
    num_drones: usize,
}

#[derive(Deserialize)]
struct EncircleArgs {
    swarm_id: EntityId,
    is_encircling: bool,
    #[serde(default)]
    radius: Option<f32>,
}

impl PositionArgs {
    fn into_spec(self) -> TargetSpec {
        TargetSpec::position(self.x, self.y)
    }
}

impl FollowArgs {
    fn into_spec(self) -> TargetSpec {
        TargetSpec::follow(self.target_id)
    }
}

impl WaypointArgs {
    fn into_spec(self) -> TargetSpec {
        TargetSpec::waypoints(self.waypoints, self.cycle)
    }
}

/// Every command name the controller may send
pub const COMMAND_NAMES: [&str; 14] = [
    "get_environment",
    "allocate_swarm_to_position",
    "allocate_swarm_to_follow",
    "allocate_swarm_to_waypoints",
    "deallocate_swarm",
    "reassign_drones",
    "merge_swarm",
    "fork_swarm_to_position",
    "fork_swarm_to_follow",
    "fork_swarm_to_waypoints",
    "assign_swarm_to_position",
    "assign_swarm_to_follow",
    "assign_swarm_to_waypoints",
    "set_swarm_encircle",
];

impl Envelope {
    pub fn new(command: impl Into<String>, args: Value) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Parse an envelope from a raw JSON payload
    pub fn from_slice(data: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Decode into a typed command. Unknown names are reported separately
    /// from known commands with bad arguments.
    pub fn into_command(self) -> Result<Command, ProtocolError> {
        let name = self.command.as_str();
        if !COMMAND_NAMES.contains(&name) {
            return Err(ProtocolError::UnknownCommand(name.to_string()));
        }

        let args = match self.args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        let command = match name {
            "get_environment" => Command::GetEnvironment,
            "allocate_swarm_to_position" => Command::Allocate {
                target: parse::<PositionArgs>(name, &args)?.into_spec(),
            },
            "allocate_swarm_to_follow" => Command::Allocate {
                target: parse::<FollowArgs>(name, &args)?.into_spec(),
            },
            "allocate_swarm_to_waypoints" => Command::Allocate {
                target: parse::<WaypointArgs>(name, &args)?.into_spec(),
            },
            "deallocate_swarm" => Command::Deallocate {
                swarm_id: parse::<SwarmArgs>(name, &args)?.swarm_id,
            },
            "reassign_drones" => {
                let a = parse::<ReassignArgs>(name, &args)?;
                Command::Reassign {
                    source: a.source_swarm_id,
                    dest: a.target_swarm_id,
                    count: a.num_drones,
                }
            }
            "merge_swarm" => {
                let a = parse::<MergeArgs>(name, &args)?;
                Command::Merge {
                    source: a.source_swarm_id,
                    dest: a.target_swarm_id,
                }
            }
            "fork_swarm_to_position" | "fork_swarm_to_follow" | "fork_swarm_to_waypoints" => {
                let fork = parse::<ForkArgs>(name, &args)?;
                let target = match name {
                    "fork_swarm_to_position" => parse::<PositionArgs>(name, &args)?.into_spec(),
                    "fork_swarm_to_follow" => parse::<FollowArgs>(name, &args)?.into_spec(),
                    _ => parse::<WaypointArgs>(name, &args)?.into_spec(),
                };
                Command::Fork {
                    source: fork.source_swarm_id,
                    count: fork.num_drones,
                    target,
                }
            }
            "assign_swarm_to_position" | "assign_swarm_to_follow" | "assign_swarm_to_waypoints" => {
                let swarm_id = parse::<SwarmArgs>(name, &args)?.swarm_id;
                let target = match name {
                    "assign_swarm_to_position" => parse::<PositionArgs>(name, &args)?.into_spec(),
                    "assign_swarm_to_follow" => parse::<FollowArgs>(name, &args)?.into_spec(),
                    _ => parse::<WaypointArgs>(name, &args)?.into_spec(),
                };
                Command::Assign { swarm_id, target }
            }
            "set_swarm_encircle" => {
                let a = parse::<EncircleArgs>(name, &args)?;
                Command::SetEncircle {
                    swarm_id: a.swarm_id,
                    enabled: a.is_encircling,
                    radius: a.radius,
                }
            }
            _ => return Err(ProtocolError::UnknownCommand(name.to_string())),
        };

        Ok(command)
    }
}

fn parse<T: DeserializeOwned>(command: &str, args: &Value) -> Result<T, ProtocolError> {
    T::deserialize(args).map_err(|e| ProtocolError::InvalidArguments {
        command: command.to_string(),
        reason: e.to_string(),
    })
}

/// Error category visible to controllers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownCommand,
    InvalidArguments,
    NotFound,
    InvalidState,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
}

/// Reply to one envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Result(Value),
    Error(ErrorPayload),
}

impl Response {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Error(ErrorPayload {
            kind,
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl From<CommandOutput> for Response {
    fn from(output: CommandOutput) -> Self {
        Response::Result(output.into_value())
    }
}

impl From<&ProtocolError> for Response {
    fn from(e: &ProtocolError) -> Self {
        let kind = match e {
            ProtocolError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            ProtocolError::InvalidArguments { .. } | ProtocolError::Malformed(_) => {
                ErrorKind::InvalidArguments
            }
        };
        Response::error(kind, e.to_string())
    }
}

impl From<&SwarmError> for Response {
    fn from(e: &SwarmError) -> Self {
        let kind = match e {
            SwarmError::SwarmNotFound(_)
            | SwarmError::EntityNotFound(_)
            | SwarmError::DroneNotFound(_) => ErrorKind::NotFound,
            SwarmError::SelfFollow(_) | SwarmError::SameSwarm(_) => ErrorKind::InvalidState,
            SwarmError::EmptyWaypoints
            | SwarmError::NonFiniteTarget
            | SwarmError::TargetOutOfRange(_)
            | SwarmError::InvalidRadius(_) => ErrorKind::InvalidArguments,
        };
        Response::error(kind, e.to_string())
    }
}

impl From<&CommandQueueError> for Response {
    fn from(e: &CommandQueueError) -> Self {
        Response::error(ErrorKind::Unavailable, e.to_string())
    }
}

/// Position rounded to whole world units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundedPosition {
    pub x: i64,
    pub y: i64,
}

impl From<Vec2> for RoundedPosition {
    fn from(v: Vec2) -> Self {
        let rounded = v.round();
        Self {
            x: rounded.x as i64,
            y: rounded.y as i64,
        }
    }
}

/// Description of what a swarm is pursuing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetSnapshot {
    Coordinate {
        position: RoundedPosition,
    },
    /// Followed swarm, described by ID only
    Swarm {
        id: EntityId,
    },
    Car {
        id: EntityId,
        position: RoundedPosition,
    },
    Landmark {
        id: EntityId,
        position: RoundedPosition,
    },
    Waypoints {
        waypoints: Vec<RoundedPosition>,
        cycle: bool,
    },
}

impl TargetSnapshot {
    pub fn from_target(target: &Target, world: &World) -> Self {
        match target {
            Target::Point(position) => TargetSnapshot::Coordinate {
                position: (*position).into(),
            },
            Target::Follow(follow) => {
                if world.contains_swarm(follow.entity) {
                    TargetSnapshot::Swarm { id: follow.entity }
                } else if let Some(prop) = world.prop(follow.entity) {
                    PropSnapshot::from_prop(prop).into()
                } else {
                    TargetSnapshot::Coordinate {
                        position: target.resolve(world).into(),
                    }
                }
            }
            Target::Waypoints(chain) => TargetSnapshot::Waypoints {
                waypoints: chain.points().map(RoundedPosition::from).collect(),
                cycle: chain.is_cycling(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmSnapshot {
    pub id: EntityId,
    pub center_of_mass: RoundedPosition,
    pub num_drones: usize,
    pub num_drone_specializations: SpecializationCounts,
    pub target: TargetSnapshot,
    pub is_encircling: bool,
    /// Only present while encircling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
}

impl SwarmSnapshot {
    pub fn from_swarm(swarm: &Swarm, world: &World) -> Self {
        Self {
            id: swarm.id,
            center_of_mass: swarm.position().into(),
            num_drones: swarm.member_count(),
            num_drone_specializations: swarm.specialization_counts().clone(),
            target: TargetSnapshot::from_target(swarm.target(), world),
            is_encircling: swarm.is_encircling(),
            radius: swarm.is_encircling().then_some(swarm.radius()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropSnapshot {
    Car {
        id: EntityId,
        position: RoundedPosition,
    },
    Landmark {
        id: EntityId,
        position: RoundedPosition,
    },
}

impl PropSnapshot {
    pub fn from_prop(prop: &Prop) -> Self {
        let position = prop.position.into();
        match prop.kind {
            PropKind::Car { .. } => PropSnapshot::Car {
                id: prop.id,
                position,
            },
            PropKind::Landmark => PropSnapshot::Landmark {
                id: prop.id,
                position,
            },
        }
    }
}

impl From<PropSnapshot> for TargetSnapshot {
    fn from(prop: PropSnapshot) -> Self {
        match prop {
            PropSnapshot::Car { id, position } => TargetSnapshot::Car { id, position },
            PropSnapshot::Landmark { id, position } => TargetSnapshot::Landmark { id, position },
        }
    }
}

/// Full environment description returned by `get_environment`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub swarms: Vec<SwarmSnapshot>,
    pub props: Vec<PropSnapshot>,
    pub unassigned_drones: usize,
    pub total_drones: usize,
}

impl WorldSnapshot {
    pub fn from_world(world: &World, tick: u64) -> Self {
        Self {
            tick,
            swarms: world
                .swarms()
                .map(|swarm| SwarmSnapshot::from_swarm(swarm, world))
                .collect(),
            props: world.props().iter().map(PropSnapshot::from_prop).collect(),
            unassigned_drones: world.unassigned_drone_count(),
            total_drones: world.drone_count(),
        }
    }

    /// Look up a described entity's position (swarm or prop)
    pub fn position_of(&self, id: EntityId) -> Option<RoundedPosition> {
        self.swarms
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.center_of_mass)
            .or_else(|| {
                self.props.iter().find_map(|p| match p {
                    PropSnapshot::Car { id: pid, position }
                    | PropSnapshot::Landmark { id: pid, position }
                        if *pid == id =>
                    {
                        Some(*position)
                    }
                    _ => None,
                })
            })
    }
}
