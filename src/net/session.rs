//! Fixed-rate simulation loop

use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

use crate::game::command_queue::CommandQueue;
use crate::game::constants::sim::STATUS_LOG_INTERVAL_SECS;
use crate::game::game_loop::{GameLoop, TickStats};

/// Ticks between status log lines at `tick_rate`
pub fn status_interval_ticks(tick_rate: u32) -> u64 {
    (tick_rate.max(1) as u64) * STATUS_LOG_INTERVAL_SECS
}

/// Drive the simulation forever: drain commands, tick, repeat at `tick_rate` Hz.
///
/// Missed ticks are skipped rather than replayed in a burst.
pub async fn run_simulation_loop(mut game: GameLoop, queue: CommandQueue, tick_rate: u32) {
    let tick_duration = Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64);
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status_every = status_interval_ticks(tick_rate);
    let start = Instant::now();

    info!("Simulation loop started at {} Hz", tick_rate);

    loop {
        ticker.tick().await;

        game.drain_commands(&queue);
        let stats = game.tick();

        if stats.tick % status_every == 0 {
            log_status(&game, &stats, start.elapsed().as_secs());
        }
    }
}

fn log_status(game: &GameLoop, stats: &TickStats, elapsed: u64) {
    let world = game.world();
    info!(
        "Sim: {}s, tick {}, {} swarms, {} assigned / {} unassigned drones | Grid: {} cells, max {} per cell",
        elapsed,
        stats.tick,
        stats.swarms,
        stats.active_drones,
        world.unassigned_drone_count(),
        stats.grid.non_empty_cells,
        stats.grid.max_per_cell
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::commands::Command;
    use crate::game::scenario::ScenarioBuilder;
    use crate::game::systems::steering::SteeringParams;

    #[test]
    fn test_status_interval() {
        assert_eq!(status_interval_ticks(60), 1800);
        assert_eq!(status_interval_ticks(0), STATUS_LOG_INTERVAL_SECS);
    }

    #[tokio::test]
    async fn test_loop_answers_commands() {
        let world = ScenarioBuilder::default()
            .with_seed(4)
            .with_drones(12)
            .build()
            .unwrap();
        let game = GameLoop::new(world, SteeringParams::default());
        let queue = CommandQueue::new(8);
        let sender = queue.sender();

        let handle = tokio::spawn(run_simulation_loop(game, queue, 240));

        let result = sender.execute(Command::GetEnvironment).await.unwrap();
        match result {
            Ok(crate::game::commands::CommandOutput::Environment(snapshot)) => {
                assert_eq!(snapshot.total_drones, 12);
            }
            other => panic!("unexpected reply {:?}", other),
        }

        handle.abort();
    }
}
