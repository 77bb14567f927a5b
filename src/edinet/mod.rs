// src/edinet/mod.rs
pub mod client;
pub mod models;
