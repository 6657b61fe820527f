//! Reference model of attribute ownership transfer.
//!
//! The model tracks one object instance whose attributes move between a
//! small, fixed set of federates. It is small enough to be obviously
//! correct and serves as the oracle for the client state machines and
//! the in-process RTI together.
//!
//! # Design Principles
//!
//! - Simplicity: one owner slot and one pending acquirer per attribute
//! - Deterministic: same operations, same results
//! - Settled: every operation is followed by full callback delivery, so
//!   the model never has to represent callbacks in flight

pub mod operation;
mod real;
mod world;

pub use operation::{
    AttributeId, FederateId, Operation, OperationError, OperationResult, OwnershipAction,
};
pub use real::{OWNED_ATTRIBUTES, RealWorld};
pub use world::{ModelAttribute, ModelWorld, ObservableState};
