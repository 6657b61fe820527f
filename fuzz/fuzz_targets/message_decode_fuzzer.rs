//! Fuzz target for the CBOR message codec
//!
//! Untrusted bytes from a remote peer must never crash the decoder
//!
//! # Strategy
//!
//! - Raw bytes: decoded as every message type a connection carries
//! - Re-encoding: anything that decodes is encoded and decoded again
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A decoded message re-encodes without error
//! - Re-encoded bytes decode to an equal message (stable encoding)

#![no_main]

use std::fmt::Debug;

use arbitrary::Arbitrary;
use hla_proto::{
    message::{decode, encode},
    Callback, Float64Time, Integer64Time, RtiError, ServiceRequest, ServiceResponse,
};
use libfuzzer_sys::fuzz_target;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Arbitrary)]
enum Target {
    FloatRequest,
    FloatResponse,
    FloatCallback,
    IntegerRequest,
    IntegerCallback,
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    target: Target,
    bytes: Vec<u8>,
}

fn check<M>(bytes: &[u8])
where
    M: Serialize + DeserializeOwned + PartialEq + Debug,
{
    let Ok(message) = decode::<M>(bytes) else {
        return;
    };
    let encoded = match encode(&message) {
        Ok(encoded) => encoded,
        Err(err) => panic!("decoded {message:?} but could not re-encode: {err}"),
    };
    match decode::<M>(&encoded) {
        Ok(again) => assert_eq!(again, message, "unstable encoding"),
        Err(err) => panic!("re-encoded {message:?} does not decode: {err}"),
    }
}

fuzz_target!(|input: FuzzInput| {
    match input.target {
        Target::FloatRequest => check::<ServiceRequest<Float64Time>>(&input.bytes),
        Target::FloatResponse => {
            check::<Result<ServiceResponse<Float64Time>, RtiError>>(&input.bytes);
        },
        Target::FloatCallback => check::<Callback<Float64Time>>(&input.bytes),
        Target::IntegerRequest => check::<ServiceRequest<Integer64Time>>(&input.bytes),
        Target::IntegerCallback => check::<Callback<Integer64Time>>(&input.bytes),
    }
});
