//! Fuzz target comparing real ownership transfer against the reference model
//!
//! Find call sequences where federates and the RTI disagree on who owns
//! an attribute
//!
//! # Strategy
//!
//! - Operation sequences: arbitrary divest, acquire, release and cancel
//!   calls from arbitrary federates on a shared object
//! - Federation size: two to five federates
//! - Delivery order: the seed shuffles callback delivery between federates
//!
//! # Invariants
//!
//! - Every call is accepted or rejected exactly as the model predicts
//! - Final owners match the model
//! - Every federate's local view agrees with the RTI
//! - The RTI never rejects a call with an error the model does not know

#![no_main]

use arbitrary::Arbitrary;
use hla_harness::{ModelWorld, Operation, RealWorld, OWNED_ATTRIBUTES};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    seed: u64,
    federates: u8,
    operations: Vec<Operation>,
}

fuzz_target!(|input: FuzzInput| {
    let federates = 2 + usize::from(input.federates % 4);
    let mut model = ModelWorld::new(federates, OWNED_ATTRIBUTES.len());
    let real = match RealWorld::new(federates, input.seed) {
        Ok(real) => real,
        Err(err) => panic!("federation setup failed: {err}"),
    };

    for (step, op) in input.operations.iter().take(256).enumerate() {
        let expected = model.apply(op);
        let actual = match real.apply(op) {
            Ok(result) => result,
            Err(err) => panic!("step {step} {op:?}: unexpected rejection {err}"),
        };
        assert_eq!(expected, actual, "step {step} {op:?}: model and RTI diverge");
    }

    match real.observable_state() {
        Ok(state) => assert_eq!(model.observable_state(), state, "final owners diverge"),
        Err(err) => panic!("local view disagrees with the RTI: {err}"),
    }
});
