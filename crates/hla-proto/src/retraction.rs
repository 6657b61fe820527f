//! Message retraction handles.
//!
//! Every timestamp-order update, interaction or deletion returns a
//! [`MessageRetractionHandle`] identifying the message for a later
//! `retract`. The handle is the sender's federate handle plus a serial that
//! the RTI allocates per federation.
//!
//! # Wire format
//!
//! ```text
//! +----------------+----------------+
//! | serial (u64 BE)| federate (u32) |
//! +----------------+----------------+
//!      8 bytes          4 bytes
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::{BigEndian, U32, U64},
};

use crate::{
    error::{ErrorKind, RtiError},
    handle::{FederateHandle, Handle},
};

/// Identifies one retractable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageRetractionHandle {
    serial: u64,
    federate: FederateHandle,
}

#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
struct RetractionWire {
    serial: U64<BigEndian>,
    federate: U32<BigEndian>,
}

impl MessageRetractionHandle {
    /// Size of the encoded form.
    pub const ENCODED_LENGTH: usize = 12;

    /// Create a handle. Only the RTI allocates serials.
    pub fn new(serial: u64, federate: FederateHandle) -> Self {
        Self { serial, federate }
    }

    /// Per-federation serial number.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Federate that sent the message.
    pub fn federate(&self) -> FederateHandle {
        self.federate
    }

    /// Encode to the 12-byte wire form.
    pub fn encode(&self) -> [u8; Self::ENCODED_LENGTH] {
        let wire = RetractionWire {
            serial: U64::new(self.serial),
            federate: U32::new(self.federate.raw()),
        };
        let mut out = [0u8; Self::ENCODED_LENGTH];
        out.copy_from_slice(wire.as_bytes());
        out
    }

    /// Decode the 12-byte wire form.
    ///
    /// # Errors
    ///
    /// `CouldNotDecode` if `bytes` is not exactly 12 bytes long.
    pub fn decode(bytes: &[u8]) -> Result<Self, RtiError> {
        let wire = RetractionWire::read_from_bytes(bytes).map_err(|_| {
            RtiError::new(
                ErrorKind::CouldNotDecode,
                format!(
                    "retraction handle needs {} bytes, got {}",
                    Self::ENCODED_LENGTH,
                    bytes.len()
                ),
            )
        })?;
        Ok(Self {
            serial: wire.serial.get(),
            federate: FederateHandle::from_raw(wire.federate.get()),
        })
    }
}

impl fmt::Display for MessageRetractionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retraction {}@{}", self.serial, self.federate)
    }
}
