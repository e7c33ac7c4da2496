pub mod agent;
pub mod cli;
pub mod config;
pub mod simulation;
pub mod world;
