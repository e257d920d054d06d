// Public API for the terminal front-end and integration tests

pub mod auth;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod render;
pub mod session;
pub mod transport;
