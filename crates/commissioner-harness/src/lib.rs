//! Deterministic simulation harness for the commissioning engine.
//!
//! Everything the engine talks to is simulated in-process: a virtual clock
//! and seeded RNG ([`SimEnv`]), commissionees with real attestation keys and
//! a device-side fail-safe ([`SimDevice`]), and collaborators that queue every
//! request on a shared [`Bus`] instead of sending it. A [`World`] drains that
//! queue one request at a time on a single loop, so every run with the same
//! seed and [`FaultPlan`] replays identically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod device;
pub mod faults;
pub mod recorder;
pub mod scenario;
pub mod sim_env;

pub use bus::{Bus, Outbound, SharedBus};
pub use device::{DeviceNetwork, ExistingFabric, SimDevice};
pub use faults::{Fault, FaultPlan};
pub use recorder::{DelegateEvent, EventLog, RecordingAttestationPolicy, RecordingPairingDelegate};
pub use scenario::{OracleFn, RunnableScenario, Scenario, World};
pub use sim_env::SimEnv;
