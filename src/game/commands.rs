//! Typed controller commands and their application to the world

use serde_json::Value;
use tracing::debug;

use crate::game::lifecycle::SwarmError;
use crate::game::state::{SwarmId, World};
use crate::game::target::TargetSpec;
use crate::net::protocol::WorldSnapshot;

/// A decoded controller command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetEnvironment,
    Allocate {
        target: TargetSpec,
    },
    Deallocate {
        swarm_id: SwarmId,
    },
    Reassign {
        source: SwarmId,
        dest: SwarmId,
        count: usize,
    },
    Merge {
        source: SwarmId,
        dest: SwarmId,
    },
    Fork {
        source: SwarmId,
        count: usize,
        target: TargetSpec,
    },
    Assign {
        swarm_id: SwarmId,
        target: TargetSpec,
    },
    /// `radius: None` keeps the swarm's current radius
    SetEncircle {
        swarm_id: SwarmId,
        enabled: bool,
        radius: Option<f32>,
    },
}

impl Command {
    /// Wire name of the command, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetEnvironment => "get_environment",
            Command::Allocate { .. } => "allocate_swarm",
            Command::Deallocate { .. } => "deallocate_swarm",
            Command::Reassign { .. } => "reassign_drones",
            Command::Merge { .. } => "merge_swarm",
            Command::Fork { .. } => "fork_swarm",
            Command::Assign { .. } => "assign_swarm",
            Command::SetEncircle { .. } => "set_swarm_encircle",
        }
    }

    /// Apply to the world. `tick` is only used to stamp environment snapshots.
    pub fn apply(self, world: &mut World, tick: u64) -> Result<CommandOutput, SwarmError> {
        debug!("Applying command {}", self.name());
        match self {
            Command::GetEnvironment => Ok(CommandOutput::Environment(Box::new(
                WorldSnapshot::from_world(world, tick),
            ))),
            Command::Allocate { target } => world.allocate(target).map(CommandOutput::Swarm),
            Command::Deallocate { swarm_id } => {
                world.deallocate(swarm_id).map(|_| CommandOutput::Done)
            }
            Command::Reassign {
                source,
                dest,
                count,
            } => world.reassign(source, dest, count).map(CommandOutput::Moved),
            Command::Merge { source, dest } => world.merge(source, dest).map(CommandOutput::Swarm),
            Command::Fork {
                source,
                count,
                target,
            } => world.fork(source, count, target).map(CommandOutput::Swarm),
            Command::Assign { swarm_id, target } => {
                world.retarget(swarm_id, target).map(|_| CommandOutput::Done)
            }
            Command::SetEncircle {
                swarm_id,
                enabled,
                radius,
            } => {
                let radius = match radius {
                    Some(radius) => radius,
                    None => world
                        .swarm(swarm_id)
                        .ok_or(SwarmError::SwarmNotFound(swarm_id))?
                        .radius(),
                };
                world
                    .set_encircle(swarm_id, enabled, radius)
                    .map(CommandOutput::Encircling)
            }
        }
    }
}

/// Successful command result
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Environment(Box<WorldSnapshot>),
    /// ID of the created or surviving swarm
    Swarm(SwarmId),
    /// Number of drones moved
    Moved(usize),
    /// Resulting encircling flag
    Encircling(bool),
    Done,
}

impl CommandOutput {
    /// JSON value placed under `"result"` in the reply
    pub fn into_value(self) -> Value {
        match self {
            CommandOutput::Environment(snapshot) => {
                serde_json::to_value(*snapshot).unwrap_or(Value::Null)
            }
            CommandOutput::Swarm(id) => Value::from(id.0),
            CommandOutput::Moved(count) => Value::from(count),
            CommandOutput::Encircling(flag) => Value::Bool(flag),
            CommandOutput::Done => Value::Bool(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{EntityId, Specialization};
    use crate::util::vec2::Vec2;

    fn world_with_swarm(members: usize) -> (World, SwarmId) {
        let mut world = World::default();
        let swarm = world.allocate(TargetSpec::position(0.0, 0.0)).unwrap();
        for _ in 0..members {
            let id = world.add_drone(Vec2::ZERO, Specialization::Scout);
            world.enlist(id, swarm).unwrap();
        }
        (world, swarm)
    }

    #[test]
    fn test_fork_command_returns_new_id() {
        let (mut world, swarm) = world_with_swarm(6);
        let output = Command::Fork {
            source: swarm,
            count: 2,
            target: TargetSpec::position(10.0, 10.0),
        }
        .apply(&mut world, 0)
        .unwrap();

        match output {
            CommandOutput::Swarm(id) => assert_eq!(world.swarm(id).unwrap().member_count(), 2),
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_set_encircle_keeps_radius_when_omitted() {
        let (mut world, swarm) = world_with_swarm(1);
        world.set_encircle(swarm, false, 75.0).unwrap();

        let output = Command::SetEncircle {
            swarm_id: swarm,
            enabled: true,
            radius: None,
        }
        .apply(&mut world, 0)
        .unwrap();

        assert_eq!(output, CommandOutput::Encircling(true));
        assert_eq!(world.swarm(swarm).unwrap().radius(), 75.0);
    }

    #[test]
    fn test_command_failure_is_error_value() {
        let (mut world, _) = world_with_swarm(1);
        let result = Command::Deallocate {
            swarm_id: EntityId(404),
        }
        .apply(&mut world, 0);
        assert!(matches!(result, Err(SwarmError::SwarmNotFound(_))));
    }

    #[test]
    fn test_output_values() {
        assert_eq!(CommandOutput::Moved(3).into_value(), Value::from(3));
        assert_eq!(CommandOutput::Swarm(EntityId(7)).into_value(), Value::from(7));
        assert_eq!(CommandOutput::Done.into_value(), Value::Bool(true));
    }

    #[test]
    fn test_environment_between_ticks_reports_member_centroids() {
        let mut world = World::default();
        let swarm = world.allocate(TargetSpec::position(500.0, 500.0)).unwrap();
        for i in 0..4 {
            let id = world.add_drone(Vec2::new(i as f32 * 5.0, 0.0), Specialization::Scout);
            world.enlist(id, swarm).unwrap();
        }
        Command::Fork {
            source: swarm,
            count: 2,
            target: TargetSpec::position(300.0, 300.0),
        }
        .apply(&mut world, 0)
        .unwrap();

        let value = Command::GetEnvironment.apply(&mut world, 0).unwrap().into_value();
        assert_eq!(value["swarms"][0]["center_of_mass"]["x"], 13);
        assert_eq!(value["swarms"][0]["center_of_mass"]["y"], 0);
        assert_eq!(value["swarms"][1]["center_of_mass"]["x"], 3);
        assert_eq!(value["swarms"][1]["center_of_mass"]["y"], 0);
    }

    #[test]
    fn test_environment_output() {
        let (mut world, swarm) = world_with_swarm(4);
        let output = Command::GetEnvironment.apply(&mut world, 12).unwrap();
        let value = output.into_value();

        assert_eq!(value["tick"], 12);
        assert_eq!(value["swarms"][0]["id"], swarm.0);
        assert_eq!(value["swarms"][0]["num_drones"], 4);
    }
}
