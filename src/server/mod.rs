mod extract;
mod handlers;
mod models;
mod state;

pub use handlers::run_server;
