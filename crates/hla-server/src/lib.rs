//! In-process RTI.
//!
//! A complete, single-process implementation of the RTI side of the HLA
//! federate protocol. It exists so federates built on `hla-client` can be
//! exercised end to end without a networked RTI: tests, the simulation
//! harness and the fuzz targets all run against it.
//!
//! ## Architecture
//!
//! ```text
//! hla-server
//!   ├─ LocalRti / LocalConnection  (RtiConnection over a shared lock)
//!   ├─ RtiServer                   (connections, federation directory)
//!   ├─ Federation                  (membership, declarations, objects,
//!   │                               ownership, time, regions, save/restore)
//!   └─ ObjectModel                 (merged FOM modules)
//! ```
//!
//! Every request runs to completion under one lock, so the whole RTI is
//! a single serial state machine and callbacks reach each connection in
//! the order they were produced.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod federation;
pub mod object_model;
pub mod server;

pub use config::{DEFAULT_SEVER_REASON, RtiConfig};
pub use connection::{LocalConnection, LocalRti};
pub use federation::{Delivery, Federation, Owner};
pub use object_model::{ObjectModel, ObjectModelError};
pub use server::{ConnectionId, RtiServer};
