//! Federation-wide properties over random inputs.

use bytes::Bytes;
use hla_harness::SimFederation;
use hla_proto::{
    Callback, ErrorKind, Float64Interval, Float64Time, FomModule, ParameterValues,
};
use proptest::prelude::*;

fn fom() -> FomModule {
    FomModule::new("clock").interaction_class("Tick", None, &["seq"])
}

fn t(value: f64) -> Float64Time {
    Float64Time::new(value).unwrap()
}

/// Sender regulating with lookahead 1.0, listener constrained, both at 0.
fn regulated_pair(seed: u64) -> SimFederation<Float64Time> {
    let mut federation = SimFederation::new("clock", vec![fom()], seed);
    federation.join("sender").unwrap();
    federation.join("listener").unwrap();
    let (sender, listener) = (&federation[0], &federation[1]);
    let tick = sender.rti().get_interaction_class_handle("Tick").unwrap();

    sender.rti().enable_time_regulation(Float64Interval::new(1.0).unwrap()).unwrap();
    sender.rti().publish_interaction_class(tick).unwrap();
    listener.rti().enable_time_constrained().unwrap();
    listener.rti().subscribe_interaction_class(tick).unwrap();
    federation.pump().unwrap();
    federation.clear_callbacks();
    federation
}

fn delivered_times(callbacks: &[Callback<Float64Time>]) -> Vec<f64> {
    callbacks
        .iter()
        .filter_map(|c| match c {
            Callback::ReceiveInteraction { info, .. } => info.time.map(Float64Time::value),
            _ => None,
        })
        .collect()
}

#[test]
fn advancing_to_the_current_time_is_refused() {
    let federation = regulated_pair(0);
    let listener = federation[1].rti();

    let err = listener.time_advance_request(t(0.0)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LogicalTimeAlreadyPassed);

    listener.time_advance_request(t(0.5)).unwrap();
    federation.pump().unwrap();
    assert_eq!(listener.query_logical_time().unwrap(), t(0.5));
    let err = listener.time_advance_request(t(0.5)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::LogicalTimeAlreadyPassed);
}

#[test]
fn sending_inside_the_lookahead_is_refused() {
    let federation = regulated_pair(0);
    let sender = federation[0].rti();
    let tick = sender.get_interaction_class_handle("Tick").unwrap();

    let err = sender.send_interaction_at(tick, ParameterValues::new(), "", t(0.5)).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidLogicalTime);

    assert!(sender.send_interaction_at(tick, ParameterValues::new(), "", t(1.0)).unwrap().is_some());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// No timestamped message arrives before the grant covers it, and
    /// messages arrive in timestamp order.
    #[test]
    fn prop_timestamp_order_is_respected(
        seed in any::<u64>(),
        stamps in prop::collection::vec(1u32..200, 1..20),
        midpoint in 1u32..200,
    ) {
        let federation = regulated_pair(seed);
        let (sender, listener) = (&federation[0], &federation[1]);
        let tick = sender.rti().get_interaction_class_handle("Tick").unwrap();
        let seq = sender.rti().get_parameter_handle(tick, "seq").unwrap();

        for (n, stamp) in stamps.iter().enumerate() {
            let mut parameters = ParameterValues::new();
            parameters.add(seq, n.to_be_bytes().to_vec()).unwrap();
            sender.rti().send_interaction_at(tick, parameters, Bytes::new(), t(f64::from(*stamp))).unwrap();
        }
        sender.rti().time_advance_request(t(1000.0)).unwrap();
        federation.pump().unwrap();

        let mid = f64::from(midpoint) + 0.5;
        listener.rti().time_advance_request(t(mid)).unwrap();
        federation.pump().unwrap();
        let first = delivered_times(&listener.callbacks().take());
        prop_assert!(first.iter().all(|&time| time <= mid));
        prop_assert!(first.is_sorted());

        listener.rti().time_advance_request(t(500.0)).unwrap();
        federation.pump().unwrap();
        let second = delivered_times(&listener.callbacks().take());
        prop_assert!(second.iter().all(|&time| time > mid));
        prop_assert!(second.is_sorted());
        prop_assert_eq!(first.len() + second.len(), stamps.len());
    }

    /// Achieving a label again never triggers a second synchronization.
    #[test]
    fn prop_achieving_twice_synchronizes_once(
        seed in any::<u64>(),
        members in 2..5usize,
        repeats in prop::collection::vec(0..5usize, 0..10),
    ) {
        let mut federation = SimFederation::<Float64Time>::new("clock", vec![fom()], seed);
        for i in 0..members {
            federation.join(&format!("fed{i}")).unwrap();
        }
        federation[0].rti().register_federation_synchronization_point("ready", Bytes::new(), None).unwrap();
        federation.pump().unwrap();

        for federate in federation.federates() {
            federate.rti().synchronization_point_achieved("ready", true).unwrap();
        }
        for &index in &repeats {
            let federate = &federation[index % members];
            federate.rti().synchronization_point_achieved("ready", true).unwrap_or_else(|err| {
                assert_eq!(err.kind, ErrorKind::SynchronizationPointLabelNotAnnounced);
            });
            federation.pump().unwrap();
        }
        federation.pump().unwrap();

        for federate in federation.federates() {
            prop_assert_eq!(federate.callbacks().named("federationSynchronized").len(), 1);
        }
    }
}
