//! Typed handles.
//!
//! The RTI identifies every object-model element and runtime entity by an
//! opaque 32-bit integer. Each kind gets its own newtype so that an
//! attribute handle can never be passed where an object instance handle is
//! expected. Handles are allocated by the RTI; federates only receive them,
//! either in service responses or by decoding their wire form.
//!
//! # Wire format
//!
//! Every handle encodes to 4 big-endian bytes.

use std::{fmt, hash::Hash};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RtiError};

/// Encoded length of every handle kind.
pub const HANDLE_ENCODED_LENGTH: usize = 4;

/// Behaviour shared by all handle kinds.
pub trait Handle:
    Copy + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Short human-readable kind name, used in error messages.
    const KIND: &'static str;

    /// Error kind reported when a handle of this kind is not recognised.
    const NOT_FOUND: ErrorKind;

    /// Wrap a raw value received from the RTI.
    fn from_raw(raw: u32) -> Self;

    /// Raw numeric value.
    fn raw(self) -> u32;

    /// Canonical 4-byte big-endian encoding.
    fn encode(self) -> [u8; HANDLE_ENCODED_LENGTH] {
        self.raw().to_be_bytes()
    }

    /// Decode from the canonical encoding.
    ///
    /// # Errors
    ///
    /// `CouldNotDecode` if `bytes` is not exactly 4 bytes long.
    fn decode(bytes: &[u8]) -> Result<Self, RtiError> {
        let raw: [u8; HANDLE_ENCODED_LENGTH] = bytes.try_into().map_err(|_| {
            RtiError::new(
                ErrorKind::CouldNotDecode,
                format!("{} handle needs {HANDLE_ENCODED_LENGTH} bytes, got {}", Self::KIND, bytes.len()),
            )
        })?;
        Ok(Self::from_raw(u32::from_be_bytes(raw)))
    }

    /// Error reporting that this handle is not recognised.
    fn not_found(self) -> RtiError {
        RtiError::new(Self::NOT_FOUND, format!("{} {self}", Self::KIND))
    }
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $not_found:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl Handle for $name {
            const KIND: &'static str = $kind;
            const NOT_FOUND: ErrorKind = ErrorKind::$not_found;

            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

define_handle!(
    /// Object class in the object model.
    ObjectClassHandle, "object-class", ObjectClassNotDefined
);
define_handle!(
    /// Attribute of an object class.
    AttributeHandle, "attribute", AttributeNotDefined
);
define_handle!(
    /// Interaction class in the object model.
    InteractionClassHandle, "interaction-class", InteractionClassNotDefined
);
define_handle!(
    /// Parameter of an interaction class.
    ParameterHandle, "parameter", InteractionParameterNotDefined
);
define_handle!(
    /// Registered object instance.
    ObjectInstanceHandle, "object", ObjectInstanceNotKnown
);
define_handle!(
    /// Joined federate.
    FederateHandle, "federate", FederateHandleNotKnown
);
define_handle!(
    /// DDM region.
    RegionHandle, "region", InvalidRegion
);
define_handle!(
    /// DDM dimension.
    DimensionHandle, "dimension", InvalidDimensionHandle
);
