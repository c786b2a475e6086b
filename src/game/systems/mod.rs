pub mod props;
pub mod steering;
pub mod swarm;
