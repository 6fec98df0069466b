//! Device commissioning engine
//!
//! Provisions a newly discovered, untrusted device onto an administrative
//! fabric: secure pairing, device attestation, operational certificate
//! issuance, network provisioning, and the final operational session, run as
//! one resumable and cancellable saga.
//!
//! # Architecture
//!
//! The engine is a single-owner, event-driven state machine. It never blocks
//! and never performs I/O itself. Every device-facing request is handed to a
//! collaborator trait in [`services`] together with a [`services::RequestId`],
//! and the driver later feeds the outcome back as a
//! [`CommissionerEvent`]. Time and randomness come from [`mod@env`].
//!
//! ```text
//!        pair_device / commission
//!                  │
//!                  ▼
//!   ┌───────────────────────────────┐   NextStep   ┌──────────────────────┐
//!   │ perform_commissioning_step    │◄─────────────│ CommissioningDelegate│
//!   │  (one unit of work per stage) │              │ (AutoCommissioner)   │
//!   └───────────────┬───────────────┘              └──────────▲───────────┘
//!                   │ request                                 │ stage report
//!                   ▼                                         │
//!          collaborators (services)  ──event──►  commissioning_stage_complete
//! ```
//!
//! # Components
//!
//! - [`commissioner`]: the orchestrator (dispatch, fail-safe, attestation,
//!   certificate, network and cleanup flows)
//! - [`auto`]: default commissioning delegate choosing the next stage
//! - [`info_reader`]: batched commissioning-info read and parse
//! - [`failsafe`]: fail-safe expiry bookkeeping
//! - [`fabric`]: fabric identity and NOC lifecycle
//! - [`device`]: commissionee proxies and their fixed-capacity pool
//! - [`stage`], [`params`], [`report`]: saga vocabulary
//! - [`delegate`], [`services`]: surfaces exposed to and consumed from
//!   collaborators

pub mod auto;
pub mod commissioner;
pub mod config;
pub mod delegate;
pub mod device;
pub mod env;
pub mod error;
pub mod event;
pub mod fabric;
pub mod failsafe;
pub mod info_reader;
pub mod params;
pub mod report;
pub mod services;
pub mod stage;

pub use auto::AutoCommissioner;
pub use commissioner::Commissioner;
pub use config::CommissionerConfig;
pub use delegate::{AttestationPolicyDelegate, CommissioningDelegate, NextStep, PairingDelegate};
pub use device::{DeviceHandle, PeerAddress};
pub use env::{Environment, SystemEnv};
pub use error::{CommissioningError, ErrorKind};
pub use event::CommissionerEvent;
pub use params::CommissioningParameters;
pub use report::{CommissioningReport, CompletionStatus, ReadCommissioningInfo};
pub use stage::CommissioningStage;
