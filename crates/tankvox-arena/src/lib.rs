//! Headless arena runs: build an arena, let enemies hunt a player, time
//! every phase of the tick.

pub mod report;
pub mod runner;
pub mod scenes;
