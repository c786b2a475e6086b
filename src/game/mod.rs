pub mod command_queue;
pub mod commands;
pub mod constants;
pub mod game_loop;
pub mod lifecycle;
pub mod scenario;
pub mod spatial;
pub mod state;
pub mod systems;
pub mod target;
