//! Scenario testing.
//!
//! A [`Scenario`] declares devices, parameters and faults. It cannot run
//! until an oracle is attached, so every scenario ends in an explicit check
//! of the final [`World`].

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, SETUP_CODE, Scenario};
pub use world::{COMMISSIONER_NODE_ID, FABRIC_ID, World};

/// Verification run against the world after a scenario.
pub type OracleFn = Box<dyn Fn(&World) -> Result<(), String>>;
