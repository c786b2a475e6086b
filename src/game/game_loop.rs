//! World tick driver
//!
//! Owns the world and runs one fixed-order tick at a time:
//! pending commands, grid rebuild, drones, props, swarms.

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::game::command_queue::CommandQueue;
use crate::game::commands::{Command, CommandOutput};
use crate::game::lifecycle::SwarmError;
use crate::game::spatial::{DroneGrid, DroneGridStats};
use crate::game::state::{SwarmId, World};
use crate::game::systems::{props, steering, swarm};
use crate::game::systems::steering::{SteeringParams, SwarmGoal};

/// Per-tick statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    pub tick: u64,
    /// Drones currently assigned to a swarm
    pub active_drones: usize,
    pub swarms: usize,
    /// Drones whose steering result was discarded as non-finite
    pub sanitized_drones: usize,
    pub waypoint_advances: usize,
    pub grid: DroneGridStats,
}

/// Simulation driver owning the world, the grid and the steering parameters
pub struct GameLoop {
    world: World,
    grid: DroneGrid,
    params: SteeringParams,
    goals: FxHashMap<SwarmId, SwarmGoal>,
    tick: u64,
}

impl GameLoop {
    pub fn new(world: World, params: SteeringParams) -> Self {
        Self {
            world,
            grid: DroneGrid::new(params.interaction_radius()),
            params,
            goals: FxHashMap::default(),
            tick: 0,
        }
    }

    /// Use a grid cell size other than the steering interaction radius
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.grid = DroneGrid::new(cell_size);
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn grid(&self) -> &DroneGrid {
        &self.grid
    }

    pub fn params(&self) -> &SteeringParams {
        &self.params
    }

    /// Number of completed ticks
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Apply a single command between ticks
    pub fn apply(&mut self, command: Command) -> Result<CommandOutput, SwarmError> {
        command.apply(&mut self.world, self.tick)
    }

    /// Apply every queued command in submission order and answer each one.
    /// Failed commands are answered with their error; the loop carries on.
    pub fn drain_commands(&mut self, queue: &CommandQueue) -> usize {
        let pending = queue.drain();
        let count = pending.len();

        for pending in pending {
            let name = pending.command.name();
            let result = self.apply(pending.command.clone());
            if let Err(e) = &result {
                warn!("Command {} rejected: {}", name, e);
            }
            pending.respond(result);
        }

        count
    }

    /// Advance the simulation by one tick
    pub fn tick(&mut self) -> TickStats {
        self.grid.rebuild(self.world.drones.iter());

        self.collect_goals();
        let sanitized_drones =
            steering::update_all(&mut self.world, &self.grid, &self.goals, &self.params);

        props::update(&mut self.world);
        let waypoint_advances = swarm::update(&mut self.world);

        self.tick += 1;

        let stats = TickStats {
            tick: self.tick,
            active_drones: self.world.drone_count() - self.world.unassigned_drone_count(),
            swarms: self.world.swarm_count(),
            sanitized_drones,
            waypoint_advances,
            grid: self.grid.stats(),
        };

        if sanitized_drones > 0 {
            debug!("Tick {}: discarded {} non-finite drone states", self.tick, sanitized_drones);
        }

        stats
    }

    /// Resolve every swarm's goal once, before any drone moves
    fn collect_goals(&mut self) {
        self.goals.clear();
        let world = &self.world;
        for swarm in world.swarms.values() {
            self.goals.insert(
                swarm.id,
                SwarmGoal {
                    target: swarm.target.resolve(world),
                    encircling: swarm.encircling,
                    radius: swarm.radius,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Specialization;
    use crate::game::target::TargetSpec;
    use crate::util::vec2::Vec2;

    fn loop_with_swarm(drones: usize, target: TargetSpec) -> (GameLoop, SwarmId) {
        let mut world = World::default();
        let swarm = world.allocate(target).unwrap();
        for i in 0..drones {
            let id = world.add_drone(
                Vec2::new((i % 10) as f32 * 6.0, (i / 10) as f32 * 6.0),
                Specialization::ALL[i % 4],
            );
            world.enlist(id, swarm).unwrap();
        }
        (GameLoop::new(world, SteeringParams::default()), swarm)
    }

    #[test]
    fn test_tick_counts() {
        let (mut game, _) = loop_with_swarm(20, TargetSpec::position(100.0, 100.0));
        let stats = game.tick();

        assert_eq!(stats.tick, 1);
        assert_eq!(stats.active_drones, 20);
        assert_eq!(stats.swarms, 1);
        assert_eq!(stats.grid.total_entries, 20);
        assert_eq!(game.current_tick(), 1);
    }

    #[test]
    fn test_swarm_converges_on_target() {
        let target = Vec2::new(200.0, 150.0);
        let (mut game, swarm) = loop_with_swarm(10, TargetSpec::position(target.x, target.y));

        let start = game.world().swarm(swarm).unwrap().position().distance_to(target);
        // Members start around (27, 0), well away from the target
        assert!(start > 200.0, "unexpected starting distance {}", start);
        for _ in 0..600 {
            game.tick();
        }
        let end = game.world().swarm(swarm).unwrap().position().distance_to(target);

        assert!(end < start / 2.0, "swarm did not approach target: {} -> {}", start, end);
    }

    #[test]
    fn test_drones_stay_finite() {
        let (mut game, _) = loop_with_swarm(50, TargetSpec::position(30.0, 30.0));
        for _ in 0..300 {
            let stats = game.tick();
            assert_eq!(stats.sanitized_drones, 0);
        }
        assert!(game
            .world()
            .drones()
            .iter()
            .all(|d| d.position.is_finite() && d.velocity.is_finite()));
    }

    #[test]
    fn test_coincident_drones_separate() {
        let mut world = World::default();
        let swarm = world.allocate(TargetSpec::position(50.0, 50.0)).unwrap();
        for _ in 0..2 {
            let id = world.add_drone(Vec2::new(50.0, 50.0), Specialization::Scout);
            world.enlist(id, swarm).unwrap();
        }
        let mut game = GameLoop::new(world, SteeringParams::default());

        for _ in 0..5 {
            assert_eq!(game.tick().sanitized_drones, 0);
        }

        let drones = game.world().drones();
        assert!(drones.iter().all(|d| d.position.is_finite()));
        assert!(drones[0].position.distance_to(drones[1].position) > 1.0);
    }

    #[test]
    fn test_far_target_still_steers() {
        let edge = crate::game::constants::sim::COORDINATE_LIMIT;
        let (mut game, _) = loop_with_swarm(1, TargetSpec::position(edge, 0.0));
        for _ in 0..50 {
            game.tick();
        }
        let drone = &game.world().drones()[0];
        assert!(drone.position.x > 10.0, "drone did not move: {:?}", drone.position);
        assert!(drone.position.is_finite());
    }

    #[test]
    fn test_orphaned_drones_idle() {
        let (mut game, swarm) = loop_with_swarm(5, TargetSpec::position(300.0, 0.0));
        game.tick();
        game.apply(Command::Deallocate { swarm_id: swarm }).unwrap();

        let before: Vec<Vec2> = game.world().drones().iter().map(|d| d.position).collect();
        game.tick();
        let after: Vec<Vec2> = game.world().drones().iter().map(|d| d.position).collect();

        assert_eq!(before, after);
        assert!(game.world().drones().iter().all(|d| d.velocity == Vec2::ZERO));
    }

    #[test]
    fn test_drain_commands_answers_each() {
        let (mut game, swarm) = loop_with_swarm(4, TargetSpec::position(0.0, 0.0));
        let queue = CommandQueue::new(8);
        let sender = queue.sender();

        let ok = sender
            .submit(Command::SetEncircle {
                swarm_id: swarm,
                enabled: true,
                radius: Some(40.0),
            })
            .unwrap();
        let failed = sender
            .submit(Command::Deallocate {
                swarm_id: crate::game::state::EntityId(999),
            })
            .unwrap();

        assert_eq!(game.drain_commands(&queue), 2);

        let ok = tokio_test::block_on(ok).unwrap();
        assert_eq!(ok, Ok(CommandOutput::Encircling(true)));
        let failed = tokio_test::block_on(failed).unwrap();
        assert!(failed.is_err());
    }

    #[test]
    fn test_following_swarm_tracks_car() {
        let mut world = World::default();
        let car = world.add_car(
            Vec2::new(100.0, 100.0),
            5.0,
            vec![Vec2::new(400.0, 100.0), Vec2::new(100.0, 100.0)],
            0.5,
        );
        let swarm = world.allocate(TargetSpec::follow(car)).unwrap();
        for i in 0..8 {
            let id = world.add_drone(Vec2::new(100.0 + i as f32 * 5.0, 90.0), Specialization::Relay);
            world.enlist(id, swarm).unwrap();
        }
        let mut game = GameLoop::new(world, SteeringParams::default());

        for _ in 0..200 {
            game.tick();
        }

        let car_position = game.world().prop(car).unwrap().position;
        assert!(car_position.x > 150.0);
        let swarm_position = game.world().swarm(swarm).unwrap().position();
        assert!(swarm_position.distance_to(car_position) < 80.0);
    }
}
