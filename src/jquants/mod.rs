// src/jquants/mod.rs
pub mod client;
pub mod listed;
pub mod models;
