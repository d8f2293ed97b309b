/// lib.rs — Portfolio server library surface.
pub mod api;
pub mod config;
pub mod error;
pub mod publish;
pub mod state;
