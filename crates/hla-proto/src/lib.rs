//! Wire contract between an HLA federate and its RTI.
//!
//! Everything that crosses the federate/RTI boundary is defined here, with
//! no behaviour beyond validation and encoding:
//!
//! - Typed handles ([`handle`]) and handle sets ([`handle_set`])
//! - Attribute and parameter value containers ([`values`])
//! - Logical time representations ([`time`]) and retraction handles
//!   ([`retraction`])
//! - The closed error taxonomy ([`error`]) and the name adapter for the two
//!   API generations ([`generation`])
//! - Service requests, responses and callbacks with their CBOR codec
//!   ([`message`])
//! - The programmatic object model description ([`fom`])
//!
//! ## Architecture
//!
//! ```text
//! federate ── ServiceRequest ──▶ RTI
//!          ◀── ServiceResponse ─┘
//!          ◀── Callback ──────── (asynchronous)
//! ```
//!
//! Fixed-layout encodings (handles, times, retraction handles) are
//! big-endian and independent of the CBOR message codec.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod fom;
pub mod generation;
pub mod handle;
pub mod handle_set;
pub mod message;
pub mod retraction;
pub mod time;
pub mod types;
pub mod values;

pub use error::{ErrorFamily, ErrorKind, RtiError};
pub use fom::FomModule;
pub use generation::Generation;
pub use handle::{
    AttributeHandle, DimensionHandle, FederateHandle, Handle, InteractionClassHandle,
    ObjectClassHandle, ObjectInstanceHandle, ParameterHandle, RegionHandle,
};
pub use handle_set::{
    AttributeHandleSet, DimensionHandleSet, FederateHandleSet, HandleSet, RegionHandleSet,
};
pub use message::{
    AttributeRegions, Callback, CodecError, MessageInfo, RegionExtents, ServiceGroup,
    ServiceRequest, ServiceResponse,
};
pub use retraction::MessageRetractionHandle;
pub use time::{
    Float64Interval, Float64Time, Integer64Interval, Integer64Time, LogicalTime,
    LogicalTimeInterval,
};
pub use types::{
    AdvanceKind, AdvisorySwitches, CallbackModel, FederateRestoreStatus, FederateSaveStatus,
    FederationExecutionInfo, OrderType, RangeBounds, ResignAction, RestoreFailureReason,
    RestoreStatus, SaveFailureReason, SaveStatus, SyncPointFailureReason, TransportationType,
};
pub use values::{AttributeValues, HandleValueMap, ParameterValues};
