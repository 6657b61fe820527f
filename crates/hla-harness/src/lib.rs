//! Deterministic simulation harness for HLA federates.
//!
//! Federates here run against the in-process RTI from `hla-server`, with
//! a simulated clock and a seeded RNG, so a failing run can be replayed
//! from its seed.
//!
//! # Architecture
//!
//! ```text
//! SimFederation ──┬─ LocalRti (one per federation)
//!                 ├─ SimEnv   (manual clock, seeded ChaCha RNG)
//!                 └─ SimFederate × n
//!                      ├─ RtiAmbassador<_, LocalConnection, SimEnv>
//!                      └─ Recorder (FederateAmbassador that logs callbacks)
//! ```
//!
//! # Model-Based Testing
//!
//! The `model` module holds a reference model of attribute ownership
//! transfer. Operations are applied to both the model and real federates,
//! and their results and observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod recorder;
pub mod scenario;
pub mod sim_env;

pub use model::{
    AttributeId, FederateId, ModelAttribute, ModelWorld, OWNED_ATTRIBUTES, ObservableState,
    Operation, OperationError, OperationResult, OwnershipAction, RealWorld,
};
pub use recorder::Recorder;
pub use scenario::{SimAmbassador, SimFederate, SimFederation};
pub use sim_env::SimEnv;
