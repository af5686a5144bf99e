mod server;

pub mod auth;
pub mod routes;
pub mod state;
pub mod utils;
pub mod ws;

// Public API for starting/stopping the webserver
pub use server::{shutdown, start_server};
