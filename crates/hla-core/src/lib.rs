//! Sans-IO federate state machines.
//!
//! Everything a single federate must know to reject illegal call sequences
//! and to apply the transitions the RTI confirms. Nothing here performs
//! I/O: the RTI is reached through [`RtiConnection`] and time through
//! [`Environment`], both supplied by the caller.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────────────────────────────────┐
//!  ServiceRequest ──▶│ Federate                                 │
//!                    │  check ─▶ (caller sends) ─▶ record       │
//!  Callback ────────▶│  apply_callback                          │
//!                    │                                          │
//!                    │  Membership   SyncPoints   TimeState     │
//!                    │  OwnershipTable  SaveRestore             │
//!                    │  ObjectRegistry  RegionRegistry          │
//!                    └──────────────────────────────────────────┘
//! ```
//!
//! Each machine owns its preconditions (`check_*`) and its transitions.
//! [`Federate`] composes them and adds the phase guard that every service
//! shares: connected, joined, outside a save or restore window.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod env;
pub mod federate;
pub mod membership;
pub mod objects;
pub mod ownership;
pub mod regions;
pub mod save_restore;
pub mod sync;
pub mod time;

pub use connection::RtiConnection;
pub use env::Environment;
pub use federate::{Dispatch, Federate};
pub use membership::{Membership, MembershipState};
pub use objects::{KnownObject, ObjectRegistry, default_object_name};
pub use ownership::{AttributeOwnership, OwnershipTable};
pub use regions::RegionRegistry;
pub use save_restore::{RestorePhase, SavePhase, SaveRestore};
pub use sync::{AchieveOutcome, AnnouncedPoint, SyncPoints};
pub use time::{AdvanceState, TimeState, TriState};
