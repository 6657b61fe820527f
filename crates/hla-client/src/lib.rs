//! Federate-side HLA API.
//!
//! [`RtiAmbassador`] is what a simulation calls; [`FederateAmbassador`] is
//! what the RTI calls back. Between them sits the sans-IO
//! [`hla_core::Federate`], which rejects illegal call sequences before
//! anything is sent.
//!
//! # Architecture
//!
//! ```text
//! application ──▶ RtiAmbassador ──▶ Federate::check ──▶ RtiConnection
//!      ▲                                                     │
//!      └── FederateAmbassador ◀── Federate::apply_callback ◀─┘
//!                                (evoked pump or delivery thread)
//! ```
//!
//! The transport is abstract. Tests run against the in-process RTI in
//! `hla-server`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ambassador;
pub mod cache;
pub mod config;
pub mod federate_ambassador;
pub mod system_env;

pub use ambassador::RtiAmbassador;
pub use cache::HandleCache;
pub use config::{AmbassadorConfig, DEFAULT_POLL_INTERVAL};
pub use federate_ambassador::{CallbackResult, FederateAmbassador, dispatch};
pub use system_env::SystemEnv;
