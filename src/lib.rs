pub mod app;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod events;
pub mod export;
pub mod logging;
pub mod models;
pub mod streaming;
pub mod transcript;
pub mod transport;
pub mod ui;

#[cfg(test)]
mod testing;
