//! Drone Swarm Server Library
//!
//! A boids-style drone swarm simulation with a swarm lifecycle manager,
//! driven at a fixed tick rate and controlled over a JSON command channel.

pub mod config;
pub mod util;
pub mod game;
pub mod net;
