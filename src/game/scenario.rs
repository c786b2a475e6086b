//! Initial world construction

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::game::constants::scenario;
use crate::game::lifecycle::SwarmError;
use crate::game::state::{Specialization, SwarmPolicy, World};
use crate::game::target::TargetSpec;
use crate::util::vec2::Vec2;

/// Patrol square the second swarm cycles through
const PATROL_SQUARE: [(f32, f32); 4] = [
    (100.0, 100.0),
    (200.0, 100.0),
    (200.0, 200.0),
    (100.0, 200.0),
];

/// Builds a populated world: cars, landmarks, swarms with point targets,
/// drones spread uniformly and dealt to swarms round-robin.
///
/// The demo wiring follows the first car with swarm 0 and sends swarm 1
/// around a cycling patrol square, when those entities exist.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    pub drone_count: usize,
    pub swarm_count: usize,
    pub car_count: usize,
    pub landmark_count: usize,
    pub width: f32,
    pub height: f32,
    pub policy: SwarmPolicy,
    pub seed: Option<u64>,
    pub demo_targets: bool,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self {
            drone_count: scenario::DRONE_COUNT,
            swarm_count: scenario::SWARM_COUNT,
            car_count: scenario::CAR_COUNT,
            landmark_count: scenario::LANDMARK_COUNT,
            width: scenario::WORLD_WIDTH,
            height: scenario::WORLD_HEIGHT,
            policy: SwarmPolicy::default(),
            seed: None,
            demo_targets: true,
        }
    }
}

impl ScenarioBuilder {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_drones(mut self, count: usize) -> Self {
        self.drone_count = count;
        self
    }

    pub fn with_swarms(mut self, count: usize) -> Self {
        self.swarm_count = count;
        self
    }

    pub fn without_demo_targets(mut self) -> Self {
        self.demo_targets = false;
        self
    }

    pub fn build(&self) -> Result<World, SwarmError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut world = World::new(self.policy);

        let mut cars = Vec::with_capacity(self.car_count);
        for _ in 0..self.car_count {
            let route = (0..scenario::CAR_ROUTE_POINTS)
                .map(|_| self.random_point(&mut rng))
                .collect();
            let start = self.random_point(&mut rng);
            cars.push(world.add_car(start, scenario::CAR_SIZE, route, scenario::CAR_SPEED));
        }

        for _ in 0..self.landmark_count {
            let position = self.random_point(&mut rng);
            world.add_landmark(position, scenario::LANDMARK_SIZE);
        }

        let mut swarms = Vec::with_capacity(self.swarm_count);
        for _ in 0..self.swarm_count {
            let goal = self.random_point(&mut rng);
            swarms.push(world.allocate(TargetSpec::Position { position: goal })?);
        }

        for i in 0..self.drone_count {
            let position = self.random_point(&mut rng);
            let specialization = Specialization::ALL[i % Specialization::ALL.len()];
            let drone = world.add_drone(position, specialization);
            if specialization == Specialization::Decoy {
                // Decoys pose as one of the other roles
                let cover = Specialization::ALL[i % (Specialization::ALL.len() - 1)];
                world.disguise_decoy(drone, cover);
            }
            if !swarms.is_empty() {
                world.enlist(drone, swarms[i % swarms.len()])?;
            }
        }

        if self.demo_targets {
            if let (Some(&swarm), Some(&car)) = (swarms.first(), cars.first()) {
                world.retarget(swarm, TargetSpec::follow(car))?;
            }
            if let Some(&swarm) = swarms.get(1) {
                let square = PATROL_SQUARE.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
                world.retarget(swarm, TargetSpec::waypoints(square, true))?;
            }
        }

        info!(
            "Scenario built: {} drones, {} swarms, {} cars, {} landmarks",
            world.drone_count(),
            world.swarm_count(),
            self.car_count,
            self.landmark_count
        );

        Ok(world)
    }

    fn random_point(&self, rng: &mut StdRng) -> Vec2 {
        Vec2::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }
}
