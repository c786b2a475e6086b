/// Simulation clock constants
pub mod sim {
    /// Simulation tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Largest accepted target coordinate magnitude
    pub const COORDINATE_LIMIT: f32 = 1.0e6;
    /// Seconds of simulated time between status log lines
    pub const STATUS_LOG_INTERVAL_SECS: u64 = 30;
}

/// Drone body constants
pub mod drone {
    /// Drone radius in world units (two touching drones are 2 * SIZE apart)
    pub const SIZE: f32 = 2.0;
}

/// Boids steering constants
///
/// Velocities are in world units per tick. The force curves follow the
/// flocking sketch this simulation was tuned against: separation dominates,
/// alignment is a gentle heading correction, seek pulls toward the goal.
pub mod steering {
    /// Radius inside which neighbors push each other apart
    pub const SEPARATION_RADIUS: f32 = 20.0;
    /// Radius inside which neighbor headings are averaged
    pub const ALIGNMENT_RADIUS: f32 = 20.0;
    /// Maximum separation magnitude contributed by one neighbor.
    /// Overlapping drones always receive exactly this magnitude.
    pub const SEPARATION_CAP: f32 = 10.0;
    /// Maximum per-tick alignment correction
    pub const ALIGNMENT_CORRECTION: f32 = 0.1;
    /// Cruising speed used to scale alignment and seek vectors
    pub const CRUISE_SPEED: f32 = 1.0;
    /// Velocity magnitude cap
    pub const MAX_SPEED: f32 = 1.0;

    /// Blend weights (separation weighted most heavily)
    pub const SEPARATION_WEIGHT: f32 = 5.0;
    pub const ALIGNMENT_WEIGHT: f32 = 0.1;
    pub const SEEK_WEIGHT: f32 = 2.0;

    /// Distance at which plain seek reaches full strength
    pub const SEEK_SATURATION_DISTANCE: f32 = 200.0;
    /// Intrusion depth at which the outward encircle push saturates
    pub const ENCIRCLE_INNER_FALLOFF: f32 = 10.0;
    /// Excess distance at which the inward encircle pull saturates
    pub const ENCIRCLE_OUTER_FALLOFF: f32 = 100.0;
    /// Final multiplier applied to every seek strength
    pub const SEEK_STRENGTH_SCALE: f32 = 0.5;
}

/// Swarm constants
pub mod swarm {
    /// Default encircling radius for new swarms
    pub const DEFAULT_ENCIRCLE_RADIUS: f32 = 50.0;
    /// Centroid distance at which the active waypoint counts as reached
    pub const WAYPOINT_PROXIMITY: f32 = 10.0;
}

/// Spatial grid constants
pub mod grid {
    /// Cell size for the drone grid. Must cover the largest steering radius
    /// so the 3x3 query never misses a true neighbor.
    pub const CELL_SIZE: f32 = super::steering::SEPARATION_RADIUS;
}

/// Scenario (world initialization) constants
pub mod scenario {
    pub const DRONE_COUNT: usize = 1000;
    pub const SWARM_COUNT: usize = 3;
    pub const CAR_COUNT: usize = 2;
    pub const LANDMARK_COUNT: usize = 2;
    pub const WORLD_WIDTH: f32 = 600.0;
    pub const WORLD_HEIGHT: f32 = 600.0;
    /// Route points generated per car
    pub const CAR_ROUTE_POINTS: usize = 6;
    /// Car speed in world units per tick
    pub const CAR_SPEED: f32 = 0.5;
    /// Car body size (route points count as reached inside this distance)
    pub const CAR_SIZE: f32 = 5.0;
    pub const LANDMARK_SIZE: f32 = 10.0;
}

/// Controller transport constants
pub mod net {
    /// Maximum size of one framed controller message
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Default controller port
    pub const DEFAULT_PORT: u16 = 8765;
    /// Pending commands the queue holds before rejecting submissions
    pub const COMMAND_QUEUE_CAPACITY: usize = 256;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_covers_steering_radii() {
        assert!(grid::CELL_SIZE >= steering::SEPARATION_RADIUS);
        assert!(grid::CELL_SIZE >= steering::ALIGNMENT_RADIUS);
    }

    #[test]
    fn test_separation_dominates_blend() {
        assert!(steering::SEPARATION_WEIGHT > steering::SEEK_WEIGHT);
        assert!(steering::SEPARATION_WEIGHT > steering::ALIGNMENT_WEIGHT);
    }

    #[test]
    fn test_drones_fit_inside_separation_radius() {
        assert!(2.0 * drone::SIZE < steering::SEPARATION_RADIUS);
    }

    #[test]
    fn test_coordinate_limit_keeps_lengths_finite() {
        let diagonal = sim::COORDINATE_LIMIT * 2.0 * std::f32::consts::SQRT_2;
        assert!((diagonal * diagonal).is_finite());
    }
}
