use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::game::constants::{grid, net, scenario, sim};
use crate::game::scenario::ScenarioBuilder;
use crate::game::state::SwarmPolicy;
use crate::game::systems::steering::SteeringParams;

/// Simulation server configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Address the controller endpoint binds to
    pub bind_address: IpAddr,
    /// Controller endpoint port
    pub port: u16,
    /// Simulation ticks per second
    pub tick_rate: u32,
    pub drone_count: usize,
    pub swarm_count: usize,
    pub car_count: usize,
    pub landmark_count: usize,
    pub world_width: f32,
    pub world_height: f32,
    /// Pending commands held between ticks
    pub command_queue_capacity: usize,
    /// Turn exhausted waypoint chains into fixed points
    pub collapse_waypoints: bool,
    /// Seed for the initial scenario (random when unset)
    pub scenario_seed: Option<u64>,
    /// Spatial grid cell size
    pub grid_cell_size: f32,
    pub steering: SteeringParams,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: net::DEFAULT_PORT,
            tick_rate: sim::TICK_RATE,
            drone_count: scenario::DRONE_COUNT,
            swarm_count: scenario::SWARM_COUNT,
            car_count: scenario::CAR_COUNT,
            landmark_count: scenario::LANDMARK_COUNT,
            world_width: scenario::WORLD_WIDTH,
            world_height: scenario::WORLD_HEIGHT,
            command_queue_capacity: net::COMMAND_QUEUE_CAPACITY,
            collapse_waypoints: true,
            scenario_seed: None,
            grid_cell_size: grid::CELL_SIZE,
            steering: SteeringParams::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Port cannot be 0")]
    ZeroPort,
    #[error("tick_rate must be 1-240, got {0}")]
    TickRate(u32),
    #[error("World dimensions must be positive, got {0}x{1}")]
    WorldSize(f32, f32),
    #[error("command_queue_capacity must be at least 1")]
    QueueCapacity,
    #[error("Grid cell size {cell} is smaller than the steering interaction radius {radius}")]
    GridTooFine { cell: f32, radius: f32 },
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load config from an arbitrary key lookup. Invalid values are logged
    /// and the default is kept.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDRESS") {
            set_parsed(&mut config.bind_address, "BIND_ADDRESS", &addr, |_| true);
        }
        if let Some(port) = lookup("PORT") {
            set_parsed(&mut config.port, "PORT", &port, |p| *p > 0);
        }
        if let Some(rate) = lookup("TICK_RATE") {
            set_parsed(&mut config.tick_rate, "TICK_RATE", &rate, |r| (1..=240).contains(r));
        }
        if let Some(count) = lookup("DRONE_COUNT") {
            set_parsed(&mut config.drone_count, "DRONE_COUNT", &count, |_| true);
        }
        if let Some(count) = lookup("SWARM_COUNT") {
            set_parsed(&mut config.swarm_count, "SWARM_COUNT", &count, |_| true);
        }
        if let Some(count) = lookup("CAR_COUNT") {
            set_parsed(&mut config.car_count, "CAR_COUNT", &count, |_| true);
        }
        if let Some(count) = lookup("LANDMARK_COUNT") {
            set_parsed(&mut config.landmark_count, "LANDMARK_COUNT", &count, |_| true);
        }
        if let Some(width) = lookup("WORLD_WIDTH") {
            set_parsed(&mut config.world_width, "WORLD_WIDTH", &width, |w| *w > 0.0);
        }
        if let Some(height) = lookup("WORLD_HEIGHT") {
            set_parsed(&mut config.world_height, "WORLD_HEIGHT", &height, |h| *h > 0.0);
        }
        if let Some(capacity) = lookup("COMMAND_QUEUE_CAPACITY") {
            set_parsed(
                &mut config.command_queue_capacity,
                "COMMAND_QUEUE_CAPACITY",
                &capacity,
                |c| *c > 0,
            );
        }
        if let Some(collapse) = lookup("COLLAPSE_WAYPOINTS") {
            set_parsed(&mut config.collapse_waypoints, "COLLAPSE_WAYPOINTS", &collapse, |_| true);
        }
        if let Some(seed) = lookup("SCENARIO_SEED") {
            match seed.parse::<u64>() {
                Ok(parsed) => config.scenario_seed = Some(parsed),
                Err(_) => tracing::warn!("Invalid SCENARIO_SEED '{}', using a random seed", seed),
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if !(1..=240).contains(&self.tick_rate) {
            return Err(ConfigError::TickRate(self.tick_rate));
        }
        if !(self.world_width > 0.0 && self.world_height > 0.0) {
            return Err(ConfigError::WorldSize(self.world_width, self.world_height));
        }
        if self.command_queue_capacity == 0 {
            return Err(ConfigError::QueueCapacity);
        }
        let radius = self.steering.interaction_radius();
        if self.grid_cell_size < radius {
            return Err(ConfigError::GridTooFine {
                cell: self.grid_cell_size,
                radius,
            });
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn policy(&self) -> SwarmPolicy {
        SwarmPolicy {
            collapse_waypoints: self.collapse_waypoints,
            ..SwarmPolicy::default()
        }
    }

    /// Scenario builder populated from this config
    pub fn scenario(&self) -> ScenarioBuilder {
        ScenarioBuilder {
            drone_count: self.drone_count,
            swarm_count: self.swarm_count,
            car_count: self.car_count,
            landmark_count: self.landmark_count,
            width: self.world_width,
            height: self.world_height,
            policy: self.policy(),
            seed: self.scenario_seed,
            demo_targets: true,
        }
    }
}

fn set_parsed<T: FromStr>(slot: &mut T, key: &str, raw: &str, valid: impl Fn(&T) -> bool) {
    match raw.trim().parse::<T>() {
        Ok(parsed) if valid(&parsed) => *slot = parsed,
        Ok(_) => tracing::warn!("{} value '{}' out of range, using default", key, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", key, raw),
    }
}
