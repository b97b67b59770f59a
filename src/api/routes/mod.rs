pub mod health;
pub mod owners;
pub mod stats;
pub mod targets;
