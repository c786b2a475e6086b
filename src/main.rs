use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use drone_swarm_server::config::SimConfig;
use drone_swarm_server::game::command_queue::CommandQueue;
use drone_swarm_server::game::game_loop::GameLoop;
use drone_swarm_server::net::session::run_simulation_loop;
use drone_swarm_server::net::transport::ControllerServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Drone Swarm Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = SimConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {}:{}, {} Hz, {} drones in {} swarms",
        config.bind_address, config.port, config.tick_rate, config.drone_count, config.swarm_count
    );

    let world = config.scenario().build()?;
    let game = GameLoop::new(world, config.steering).with_cell_size(config.grid_cell_size);

    let queue = CommandQueue::new(config.command_queue_capacity);
    let server = ControllerServer::bind(config.socket_addr(), queue.sender()).await?;

    let simulation = tokio::spawn(run_simulation_loop(game, queue, config.tick_rate));

    // Shutdown signal handler
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Controller endpoint error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    simulation.abort();
    info!("Server stopped");

    Ok(())
}
