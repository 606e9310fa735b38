//! Core engine: the interval scheduler, the autopilot loop and its
//! maintenance tasks.

pub mod autopilot;
pub mod maintenance;
pub mod scheduler;
